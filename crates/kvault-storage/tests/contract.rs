//! Behavior every backend must share

use kvault_storage::{
    BackendKind, Connection, FilesystemBackend, MemoryBackend, ObjectStoreBackend, Storage,
    StorageBackend, StorageError, StorageOptions, Value,
};
use object_store::memory::InMemory;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    kind: &'static str,
    backend: Arc<dyn StorageBackend>,
    _dir: Option<TempDir>,
}

impl Harness {
    fn storage(&self, collection: &str, password: Option<&str>) -> Storage {
        let mut options = StorageOptions::default();
        options.password = password.map(str::to_string);
        Connection::from_backend(self.backend.clone(), &options)
            .collection(collection)
            .unwrap()
    }
}

async fn harnesses() -> Vec<Harness> {
    let dir = TempDir::new().unwrap();
    let filesystem = FilesystemBackend::new(dir.path()).await.unwrap();
    let object_store = ObjectStoreBackend::new(Arc::new(InMemory::new()), Some("kv")).unwrap();

    vec![
        Harness {
            kind: "memory",
            backend: Arc::new(MemoryBackend::new()),
            _dir: None,
        },
        Harness {
            kind: "filesystem",
            backend: Arc::new(filesystem),
            _dir: Some(dir),
        },
        Harness {
            kind: "objectstore",
            backend: Arc::new(object_store),
            _dir: None,
        },
    ]
}

/// Object store timestamps come from the wall clock; keep writes apart
async fn settle() {
    tokio::time::sleep(Duration::from_millis(2)).await;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Record {
    name: String,
    launched: u16,
    #[serde(with = "serde_bytes_compat")]
    thumbnail: Vec<u8>,
}

/// Store the byte field as a CBOR byte string rather than an integer array
mod serde_bytes_compat {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let value = ciborium::Value::deserialize(d)?;
        value
            .into_bytes()
            .map_err(|_| serde::de::Error::custom("expected a byte string"))
    }
}

#[tokio::test]
async fn roundtrip_on_every_backend() {
    for h in harnesses().await {
        let storage = h.storage("round/trip", Some("x"));
        let record = Record {
            name: "Boaty McBoatface".to_string(),
            launched: 2017,
            thumbnail: vec![0x89, b'P', b'N', b'G', 0],
        };

        storage.put("key2", &record).await.unwrap();
        storage.put("key1", "🎈").await.unwrap();
        storage.put("nul\0/../key", &Value::Null).await.unwrap();

        assert_eq!(storage.get::<Record>("key2").await.unwrap(), Some(record), "{}", h.kind);
        assert_eq!(storage.get::<String>("key1").await.unwrap().as_deref(), Some("🎈"));
        assert_eq!(
            storage.get::<Value>("nul\0/../key").await.unwrap(),
            Some(Value::Null),
            "{}",
            h.kind
        );
    }
}

#[tokio::test]
async fn list_is_newest_first_on_every_backend() {
    for h in harnesses().await {
        let storage = h.storage("order", None);
        storage.put("k1", "a").await.unwrap();
        settle().await;
        storage.put("k2", "b").await.unwrap();
        settle().await;
        storage.put("k3", "c").await.unwrap();
        settle().await;

        assert_eq!(storage.list().await.unwrap(), vec!["k3", "k2", "k1"], "{}", h.kind);
    }
}

#[tokio::test]
async fn overwrite_promotes_key_on_every_backend() {
    for h in harnesses().await {
        let storage = h.storage("overwrite", None);
        storage.put("k1", "a").await.unwrap();
        settle().await;
        storage.put("k2", "b").await.unwrap();
        settle().await;
        storage.put("k1", "a2").await.unwrap();

        assert_eq!(storage.list().await.unwrap(), vec!["k1", "k2"], "{}", h.kind);
        assert_eq!(storage.get::<String>("k1").await.unwrap().as_deref(), Some("a2"));
    }
}

#[tokio::test]
async fn missing_key_contract_on_every_backend() {
    for h in harnesses().await {
        let storage = h.storage("missing", None);
        storage.put("present", &1).await.unwrap();

        assert_eq!(storage.get_or("absent", 42).await.unwrap(), 42, "{}", h.kind);
        assert!(!storage.contains("absent").await.unwrap());
        assert!(storage.contains("present").await.unwrap());
        assert_eq!(storage.len().await.unwrap(), 1);
    }
}

#[tokio::test]
async fn pop_semantics_on_every_backend() {
    for h in harnesses().await {
        let storage = h.storage("pop", Some("x"));
        storage.put("k", &vec![1, 2]).await.unwrap();

        assert_eq!(storage.pop::<Vec<i32>>("k").await.unwrap(), Some(vec![1, 2]));
        assert!(!storage.contains("k").await.unwrap(), "{}", h.kind);
        assert_eq!(storage.pop_or::<Option<i32>>("k", None).await.unwrap(), None);
    }
}

#[tokio::test]
async fn delete_of_missing_key_is_backend_defined() {
    for h in harnesses().await {
        let storage = h.storage("delete", None);
        let result = storage.delete("absent").await;
        match h.kind {
            "objectstore" => assert!(result.is_ok()),
            _ => assert!(matches!(result, Err(StorageError::NotFound(_))), "{}", h.kind),
        }
    }
}

#[tokio::test]
async fn other_password_cannot_read_on_every_backend() {
    for h in harnesses().await {
        let writer = h.storage("secrets", Some("P1"));
        let reader = h.storage("secrets", Some("P2"));
        let anonymous = h.storage("secrets", None);

        writer.put("k", "classified").await.unwrap();

        assert!(
            matches!(reader.get::<String>("k").await, Err(StorageError::Crypto(_))),
            "{}",
            h.kind
        );
        assert!(matches!(
            anonymous.get::<String>("k").await,
            Err(StorageError::Crypto(_))
        ));
        // The key itself is still visible; only the value is protected
        assert_eq!(reader.list().await.unwrap(), vec!["k"]);
    }
}

#[tokio::test]
async fn collections_do_not_leak_on_every_backend() {
    for h in harnesses().await {
        let a = h.storage("a", None);
        let a_slash = h.storage("a/b", None);
        a.put("k", &1).await.unwrap();
        a_slash.put("k", &2).await.unwrap();

        assert_eq!(a.get::<i32>("k").await.unwrap(), Some(1), "{}", h.kind);
        assert_eq!(a_slash.get::<i32>("k").await.unwrap(), Some(2), "{}", h.kind);
        assert_eq!(a.len().await.unwrap(), 1);
    }
}

#[tokio::test]
async fn memory_end_to_end_scenario() {
    let connection = Connection::open(
        BackendKind::Memory,
        &StorageOptions::default().with_password("x"),
    )
    .await
    .unwrap();
    let storage = connection.collection("demo").unwrap();

    storage.put("a", &vec![1, 2, 3]).await.unwrap();
    storage.put("b", &vec![3, 2, 1]).await.unwrap();
    assert!(storage.contains("a").await.unwrap());
    assert!(!storage.contains("c").await.unwrap());

    storage.update([("x", 1), ("y", 2)]).await.unwrap();
    assert_eq!(storage.keys().await.unwrap(), vec!["y", "x", "b", "a"]);
    assert_eq!(storage.len().await.unwrap(), 4);
}
