//! Ties the content-addressed object store and the signed entry index
//! together: `lookup`, `materialize`, `store`, and LRU `evict`.

use crate::entry::{CacheEntry, EntryBody, OutputRef};
use crate::store::ContentStore;
use anvil_codec::{decode_versioned, encode_versioned, CodecError, SchemaVersion};
use anvil_crypto::mac::SignedPayload;
use anvil_types::action::{ActionId, ActionOutcome};
use anvil_types::error::CacheError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const ENTRY_MAGIC: u32 = 0x414E_5645; // "ANVE"
const ENTRY_MAJOR: u16 = 1;

/// The outcome of a [`ActionCache::lookup`] call.
#[derive(Debug)]
pub enum LookupResult {
    /// A valid, fresh entry was found.
    Hit(EntryBody),
    /// No entry exists for this action.
    Miss,
    /// An entry existed but failed signature verification or max-age; it
    /// has already been deleted from the index. Callers that just want
    /// "should I rebuild" can treat this identically to `Miss` — it is
    /// kept distinct here so metrics/logs can tell a cold cache apart from
    /// a tampered one.
    Corrupted,
}

#[derive(Clone)]
struct IndexRecord {
    entry: CacheEntry,
    last_access: u64,
    output_bytes: u64,
}

/// The action cache: signed entries plus their backing content objects,
/// with LRU eviction bounded by total object bytes.
pub struct ActionCache {
    objects: ContentStore,
    entries_dir: PathBuf,
    index: Mutex<BTreeMap<ActionId, IndexRecord>>,
    key: [u8; 32],
    max_age_secs: Option<u64>,
    max_bytes: Option<u64>,
}

impl ActionCache {
    /// Open (creating if absent) an action cache rooted at `root`, signing
    /// entries under `key`.
    pub fn open(
        root: impl Into<PathBuf>,
        key: [u8; 32],
        max_bytes: Option<u64>,
        max_age_secs: Option<u64>,
    ) -> std::io::Result<Self> {
        let root = root.into();
        let entries_dir = root.join("entries");
        fs::create_dir_all(&entries_dir)?;
        let objects = ContentStore::open(&root)?;
        let index = Mutex::new(load_index(&entries_dir, &objects)?);
        Ok(Self {
            objects,
            entries_dir,
            index,
            key,
            max_age_secs,
            max_bytes,
        })
    }

    fn entry_path(&self, id: ActionId) -> PathBuf {
        let hex = hex_encode(&id.0);
        self.entries_dir.join(&hex[..2]).join(format!("{}.bin", &hex[2..]))
    }

    /// Look up `id`. Verifies the signature in constant time (delegated to
    /// `anvil_crypto::mac::verify`); a tampered or stale entry is deleted
    /// and reported as [`LookupResult::Corrupted`].
    pub fn lookup(&self, id: ActionId) -> LookupResult {
        let now = now_secs();
        let record = { self.index.lock().get(&id).cloned() };
        let Some(mut record) = record else {
            return LookupResult::Miss;
        };

        match record.entry.verify(&self.key, now, self.max_age_secs) {
            Ok(body) => {
                record.last_access = now;
                self.index.lock().insert(id, record);
                LookupResult::Hit(body)
            }
            Err(_) => {
                self.index.lock().remove(&id);
                let _ = fs::remove_file(self.entry_path(id));
                LookupResult::Corrupted
            }
        }
    }

    /// Restore `id`'s declared outputs from the object store into
    /// `dest_dir`.
    pub fn materialize(
        &self,
        id: ActionId,
        body: &EntryBody,
        dest_dir: &Path,
    ) -> Result<(), CacheError> {
        for output in &body.outputs {
            let bytes = self
                .objects
                .get(&output.hash)
                .map_err(|e| CacheError::Io(e.to_string()))?
                .ok_or(CacheError::Corrupted(id))?;
            let dest = dest_dir.join(&output.path);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| CacheError::Io(e.to_string()))?;
            }
            fs::write(&dest, &bytes).map_err(|e| CacheError::Io(e.to_string()))?;
        }
        Ok(())
    }

    /// Store `outputs` (path, bytes pairs) for `id` with `outcome`, then
    /// persist the signed entry last so a crash mid-write never leaves a
    /// referenced-but-missing object: either every object and the entry
    /// exist, or the entry is absent and the cache reports a miss.
    pub fn store(
        &self,
        id: ActionId,
        outputs: &[(String, Vec<u8>)],
        outcome: ActionOutcome,
    ) -> Result<(), CacheError> {
        if !outcome.is_cacheable() {
            return Ok(());
        }

        let mut refs = Vec::with_capacity(outputs.len());
        let mut total_bytes = 0u64;
        for (path, bytes) in outputs {
            let hash = self
                .objects
                .put(bytes)
                .map_err(|e| CacheError::Io(e.to_string()))?;
            total_bytes += bytes.len() as u64;
            refs.push(OutputRef {
                path: path.clone(),
                hash,
            });
        }

        let body = EntryBody {
            outputs: refs,
            outcome,
        };
        let now = now_secs();
        let entry = CacheEntry::sign(&self.key, now, &body);

        let path = self.entry_path(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CacheError::Io(e.to_string()))?;
        }
        let bytes = encode_entry(&entry.clone().into_payload())
            .map_err(|e| CacheError::Io(e.to_string()))?;
        write_atomic(&path, &bytes).map_err(|e| CacheError::Io(e.to_string()))?;

        self.index.lock().insert(
            id,
            IndexRecord {
                entry,
                last_access: now,
                output_bytes: total_bytes,
            },
        );
        Ok(())
    }

    /// Evict least-recently-used entries (and any objects they alone
    /// referenced) until total tracked bytes are within budget. Holds only
    /// the entry-index lock for the duration of the pass; object removal
    /// happens without holding it.
    pub fn evict(&self) -> Result<usize, CacheError> {
        let Some(max_bytes) = self.max_bytes else {
            return Ok(0);
        };

        let (victims, referenced): (Vec<(ActionId, IndexRecord)>, Vec<[u8; 32]>) = {
            let mut index = self.index.lock();
            let total: u64 = index.values().map(|r| r.output_bytes).sum();
            if total <= max_bytes {
                return Ok(0);
            }
            let mut by_age: Vec<(ActionId, IndexRecord)> =
                index.iter().map(|(k, v)| (*k, v.clone())).collect();
            by_age.sort_by_key(|(_, r)| r.last_access);

            let mut freed = 0u64;
            let mut victims = Vec::new();
            for (id, record) in by_age {
                if total - freed <= max_bytes {
                    break;
                }
                freed += record.output_bytes;
                index.remove(&id);
                victims.push((id, record));
            }
            let referenced: Vec<[u8; 32]> = index
                .values()
                .flat_map(|r| output_hashes(&r.entry))
                .collect();
            (victims, referenced)
        };

        let referenced: std::collections::HashSet<[u8; 32]> = referenced.into_iter().collect();
        let mut evicted_objects = 0usize;
        for (id, record) in &victims {
            let _ = fs::remove_file(self.entry_path(*id));
            for hash in output_hashes(&record.entry) {
                if !referenced.contains(&hash) {
                    let _ = self.objects.remove(&hash);
                    evicted_objects += 1;
                }
            }
        }
        Ok(evicted_objects)
    }
}

/// The content hashes an entry's outputs reference, read directly off the
/// (already index-resident, previously verified) entry body — eviction
/// doesn't need to re-verify the signature to know what it points at.
fn output_hashes(entry: &CacheEntry) -> Vec<[u8; 32]> {
    let payload = entry.clone().into_payload();
    ciborium::de::from_reader::<EntryBody, _>(payload.body.as_slice())
        .map(|body| body.outputs.into_iter().map(|o| o.hash).collect())
        .unwrap_or_default()
}

fn encode_entry(payload: &SignedPayload) -> Result<Vec<u8>, CodecError> {
    encode_versioned(
        ENTRY_MAGIC,
        SchemaVersion {
            major: ENTRY_MAJOR,
            minor: 0,
        },
        payload,
    )
}

fn decode_entry(bytes: &[u8]) -> Option<SignedPayload> {
    decode_versioned::<SignedPayload>(bytes, ENTRY_MAGIC, ENTRY_MAJOR)
        .ok()
        .map(|(payload, _minor)| payload)
}

fn load_index(
    entries_dir: &Path,
    objects: &ContentStore,
) -> std::io::Result<BTreeMap<ActionId, IndexRecord>> {
    let mut index = BTreeMap::new();
    if !entries_dir.is_dir() {
        return Ok(index);
    }
    for shard in fs::read_dir(entries_dir)? {
        let shard = shard?.path();
        if !shard.is_dir() {
            continue;
        }
        for file in fs::read_dir(&shard)? {
            let file = file?.path();
            let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(shard_name) = shard.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(id_bytes) = hex_decode(&format!("{shard_name}{stem}")) else {
                continue;
            };
            if id_bytes.len() != 32 {
                continue;
            }
            let Ok(bytes) = fs::read(&file) else { continue };
            let Some(payload) = decode_entry(&bytes) else {
                continue;
            };
            let mut id = [0u8; 32];
            id.copy_from_slice(&id_bytes);
            let entry = CacheEntry::from_payload(payload);
            let last_access = entry.timestamp();
            let output_bytes = output_hashes(&entry)
                .iter()
                .filter_map(|h| objects.object_size(h).ok().flatten())
                .sum();
            index.insert(
                ActionId(id),
                IndexRecord {
                    entry,
                    last_access,
                    output_bytes,
                },
            );
        }
    }
    Ok(index)
}

fn write_atomic(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = dest.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "entry path has no parent directory")
    })?;
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    fs::write(tmp.path(), bytes)?;
    tmp.persist(dest).map_err(tempfile::PersistError::into_error)?;
    Ok(())
}

fn hex_encode(bytes: &[u8; 32]) -> String {
    let mut out = String::with_capacity(64);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn hex_decode(s: &str) -> Result<Vec<u8>, ()> {
    if s.len() % 2 != 0 {
        return Err(());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn outcome() -> ActionOutcome {
        ActionOutcome::Success {
            output_hashes: vec![],
            duration: Duration::from_secs(1),
        }
    }

    #[test]
    fn miss_on_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ActionCache::open(dir.path(), [1u8; 32], None, None).unwrap();
        assert!(matches!(
            cache.lookup(ActionId([7u8; 32])),
            LookupResult::Miss
        ));
    }

    #[test]
    fn store_then_lookup_is_a_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ActionCache::open(dir.path(), [1u8; 32], None, None).unwrap();
        let id = ActionId([9u8; 32]);
        cache
            .store(id, &[("out.txt".to_owned(), b"built".to_vec())], outcome())
            .unwrap();
        match cache.lookup(id) {
            LookupResult::Hit(body) => assert_eq!(body.outputs[0].path, "out.txt"),
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn materialize_restores_output_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ActionCache::open(dir.path(), [1u8; 32], None, None).unwrap();
        let id = ActionId([3u8; 32]);
        cache
            .store(id, &[("lib.a".to_owned(), b"object bytes".to_vec())], outcome())
            .unwrap();
        let LookupResult::Hit(body) = cache.lookup(id) else {
            panic!("expected hit");
        };
        let dest = tempfile::tempdir().unwrap();
        cache.materialize(id, &body, dest.path()).unwrap();
        let restored = fs::read(dest.path().join("lib.a")).unwrap();
        assert_eq!(restored, b"object bytes");
    }

    #[test]
    fn tampered_entry_is_reported_corrupted_and_then_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ActionCache::open(dir.path(), [1u8; 32], None, None).unwrap();
        let id = ActionId([5u8; 32]);
        cache
            .store(id, &[("a".to_owned(), b"bytes".to_vec())], outcome())
            .unwrap();

        let path = cache.entry_path(id);
        let bytes = fs::read(&path).unwrap();
        let mut payload = decode_entry(&bytes).unwrap();
        payload.signature[0] ^= 0xFF;
        let tampered = encode_entry(&payload).unwrap();
        fs::write(&path, &tampered).unwrap();

        // The in-memory index still has the untampered entry from `store`;
        // simulate a cold load to exercise tamper detection from disk.
        let reopened = ActionCache::open(dir.path(), [1u8; 32], None, None).unwrap();
        assert!(matches!(
            reopened.lookup(id),
            LookupResult::Corrupted
        ));
        assert!(matches!(reopened.lookup(id), LookupResult::Miss));
    }

    #[test]
    fn non_cacheable_outcomes_are_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ActionCache::open(dir.path(), [1u8; 32], None, None).unwrap();
        let id = ActionId([2u8; 32]);
        cache
            .store(
                id,
                &[("a".to_owned(), b"x".to_vec())],
                ActionOutcome::Failed {
                    kind: "compile-error".to_owned(),
                    message: "boom".to_owned(),
                },
            )
            .unwrap();
        assert!(matches!(cache.lookup(id), LookupResult::Miss));
    }

    #[test]
    fn eviction_respects_byte_budget() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ActionCache::open(dir.path(), [1u8; 32], Some(10), None).unwrap();
        cache
            .store(ActionId([1u8; 32]), &[("a".to_owned(), vec![0u8; 8])], outcome())
            .unwrap();
        cache
            .store(ActionId([2u8; 32]), &[("b".to_owned(), vec![0u8; 8])], outcome())
            .unwrap();
        let evicted = cache.evict().unwrap();
        assert!(evicted >= 1);
        assert!(matches!(
            cache.lookup(ActionId([1u8; 32])),
            LookupResult::Miss
        ));
    }
}
