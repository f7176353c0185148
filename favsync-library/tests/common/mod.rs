//! In-memory stand-ins for the metadata tool and the downloader.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use favsync_core::{AssetId, CatalogPost, PostFile, TagGroups};
use favsync_exiftool::{ChannelError, ChannelMode, ProcessChannel, ToolResponse};
use favsync_library::{Downloader, LibraryError, SidecarManager};
use serde_json::{json, Map, Value};

/// Keeps sidecar contents in memory and touches the sidecar file on disk
/// so existence checks behave as with the real tool.
#[derive(Clone, Default)]
pub struct FakeExiftool {
    state: Arc<FakeState>,
}

#[derive(Default)]
struct FakeState {
    sidecars: Mutex<HashMap<PathBuf, Map<String, Value>>>,
    calls: Mutex<Vec<Vec<String>>>,
    next_id: AtomicUsize,
}

impl FakeExiftool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manager(&self) -> SidecarManager {
        SidecarManager::with_channel(Box::new(self.clone()))
    }

    /// Create `sidecar` on disk with the given tool fields.
    pub fn seed(&self, sidecar: &Path, fields: Value) {
        std::fs::write(sidecar, b"<x:xmpmeta/>").unwrap();
        let Value::Object(fields) = fields else {
            panic!("seed fields must be an object");
        };
        self.state
            .sidecars
            .lock()
            .unwrap()
            .insert(sidecar.to_path_buf(), fields);
    }

    pub fn fields(&self, sidecar: &Path) -> Option<Map<String, Value>> {
        self.state.sidecars.lock().unwrap().get(sidecar).cloned()
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn write_calls(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|args| args.iter().any(|a| a == "-overwrite_original"))
            .collect()
    }

    fn write(&self, path: &Path, assignments: &[&String]) -> String {
        let mut sidecars = self.state.sidecars.lock().unwrap();
        let created = !sidecars.contains_key(path);
        let fields = sidecars.entry(path.to_path_buf()).or_default();
        let mut assigned: Vec<String> = Vec::new();
        for token in assignments {
            let (name, value) = token[1..].split_once('=').unwrap();
            let first = !assigned.iter().any(|n| n == name);
            assigned.push(name.to_string());
            if value.is_empty() {
                fields.remove(name);
            } else if name == "TagsList" {
                if first {
                    fields.insert(name.to_string(), json!([]));
                }
                if let Some(Value::Array(list)) = fields.get_mut(name) {
                    list.push(json!(value));
                }
            } else {
                fields.insert(name.to_string(), json!(value));
            }
        }
        std::fs::write(path, b"<x:xmpmeta/>").unwrap();
        if created {
            "    1 image files created".to_string()
        } else {
            "    1 image files updated".to_string()
        }
    }

    fn read(&self, path: &Path) -> String {
        let sidecars = self.state.sidecars.lock().unwrap();
        let mut object = sidecars.get(path).cloned().unwrap_or_default();
        object.insert("SourceFile".to_string(), json!(path.display().to_string()));
        Value::Array(vec![Value::Object(object)]).to_string()
    }
}

impl ProcessChannel for FakeExiftool {
    fn call(&self, args: &[String]) -> Result<ToolResponse, ChannelError> {
        self.state.calls.lock().unwrap().push(args.to_vec());
        let call_id = self.state.next_id.fetch_add(1, Ordering::SeqCst) as u64;
        let path = PathBuf::from(args.last().expect("target path"));
        let assignments: Vec<&String> = args
            .iter()
            .filter(|a| a.starts_with('-') && a.contains('='))
            .collect();
        let text = if assignments.is_empty() {
            self.read(&path)
        } else {
            self.write(&path, &assignments)
        };
        Ok(ToolResponse::new(call_id, text))
    }

    fn mode(&self) -> ChannelMode {
        ChannelMode::Session
    }

    fn close(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

/// Writes a fixed payload and counts fetches.
#[derive(Clone, Default)]
pub struct FakeDownloader {
    pub fetches: Arc<AtomicUsize>,
}

impl Downloader for FakeDownloader {
    fn fetch(&self, _url: &str, dest: &Path) -> Result<(), LibraryError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        std::fs::write(dest, b"asset bytes").unwrap();
        Ok(())
    }
}

/// Leaves a partial file behind and fails.
pub struct FailingDownloader;

impl Downloader for FailingDownloader {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), LibraryError> {
        std::fs::write(dest, b"partial").unwrap();
        Err(LibraryError::Download {
            url: url.to_string(),
            reason: "connection reset".to_string(),
        })
    }
}

pub fn post(id: u64, created_at: &str, description: &str, tags: &[(&str, &[&str])]) -> CatalogPost {
    let groups: Vec<(String, Vec<String>)> = tags
        .iter()
        .map(|(group, members)| {
            (
                group.to_string(),
                members.iter().map(|m| m.to_string()).collect(),
            )
        })
        .collect();
    CatalogPost {
        id: AssetId(id),
        created_at: created_at.to_string(),
        updated_at: created_at.to_string(),
        file: PostFile {
            url: Some(format!("https://static.example.net/data/ab/cd/{id}abcdef.jpg")),
            ext: Some("jpg".to_string()),
            ..PostFile::default()
        },
        description: description.to_string(),
        tags: TagGroups(groups),
    }
}
