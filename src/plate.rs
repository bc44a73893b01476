//! Plates: named, inheritable bundles of HTML fragments.
//!
//! A plate lives at `_data/plates/<name>.json`:
//!
//! ```json
//! {
//!   "extends": "base",
//!   "snippet_before": ["header"],
//!   "snippet_after": ["footer"],
//!   "body_before": [],
//!   "body_after": [],
//!   "style": ["default", "/post.css"],
//!   "script": [],
//!   "fragments": {
//!     "body": "<main>${content}</main>",
//!     "quote": "<blockquote class='pull'>${content}</blockquote>",
//!     "h2": ""
//!   }
//! }
//! ```
//!
//! `tokens` is accepted as an alias of `fragments`. When `extends` names a
//! parent, non-empty child lists replace the parent's, and fragments merge
//! key by key with the child winning. A fragment set to `""` is removed from
//! the merged plate, so lookups for it fall through to [`default_plate`].

use crate::config::DATA_DIR;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

pub const PLATES_DIR: &str = "plates";

#[derive(Error, Debug)]
pub enum PlateError {
    #[error("no such plate \"{name}\" ({path})")]
    Missing { name: String, path: PathBuf },
    #[error("failed to read plate \"{name}\": {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse plate \"{name}\": {source}")]
    Malformed {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("plate inheritance cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Plate {
    pub extends: Option<String>,
    /// Snippets rendered before the body container.
    pub snippet_before: Vec<String>,
    pub snippet_after: Vec<String>,
    /// Snippets rendered inside the body container, before the token stream.
    pub body_before: Vec<String>,
    pub body_after: Vec<String>,
    pub style: Vec<String>,
    pub script: Vec<String>,
    #[serde(alias = "tokens")]
    pub fragments: BTreeMap<String, String>,
}

impl Plate {
    /// Look up a fragment, falling back to the system default plate.
    pub fn fragment(&self, name: &str) -> Option<&str> {
        self.fragments
            .get(name)
            .or_else(|| default_plate().fragments.get(name))
            .map(String::as_str)
    }

    /// Every snippet the plate injects, in render order.
    pub fn injected_snippets(&self) -> impl Iterator<Item = &str> {
        self.snippet_before
            .iter()
            .chain(&self.body_before)
            .chain(&self.body_after)
            .chain(&self.snippet_after)
            .map(String::as_str)
    }

    /// Apply the inheritance rule with `self` as the child.
    fn inherit(mut self, parent: &Plate) -> Plate {
        inherit_list(&mut self.snippet_before, &parent.snippet_before);
        inherit_list(&mut self.snippet_after, &parent.snippet_after);
        inherit_list(&mut self.body_before, &parent.body_before);
        inherit_list(&mut self.body_after, &parent.body_after);
        inherit_list(&mut self.style, &parent.style);
        inherit_list(&mut self.script, &parent.script);

        for (key, value) in &parent.fragments {
            self.fragments
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }

    fn drop_empty_fragments(&mut self) {
        self.fragments.retain(|_, value| !value.is_empty());
    }
}

fn inherit_list(child: &mut Vec<String>, parent: &[String]) {
    if child.is_empty() {
        *child = parent.to_vec();
    }
}

/// The built-in plate every lookup falls back to.
pub fn default_plate() -> &'static Plate {
    static DEFAULT: LazyLock<Plate> = LazyLock::new(|| {
        let mut fragments = BTreeMap::new();
        for level in 1..=6 {
            fragments.insert(
                format!("h{level}"),
                format!("<h{level} id=\"${{id}}\">${{content}}</h{level}>"),
            );
        }
        for (name, pattern) in [
            ("image", "<img src=\"${content}\">"),
            ("quote", "<blockquote>${content}</blockquote>"),
            ("divider", "<hr>"),
            ("paragraph", "<p>${content}</p>"),
            ("ul", "<ul>${content}</ul>"),
            ("list", "<li>${content}</li>"),
            ("code", "<pre><code>${content}</code></pre>"),
            ("token", "<span class=\"token\">${content}</span>"),
            ("import", "<a href=\"${page_path}\">${title}</a>"),
        ] {
            fragments.insert(name.to_string(), pattern.to_string());
        }
        Plate {
            fragments,
            ..Plate::default()
        }
    });
    &DEFAULT
}

/// Loads plates from a project and memoizes the merged result by name.
#[derive(Debug)]
pub struct PlateStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Arc<Plate>>>,
}

impl PlateStore {
    pub fn new(project_root: &Path) -> Self {
        Self {
            dir: project_root.join(DATA_DIR).join(PLATES_DIR),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn plate_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Resolve a plate with its full parent chain merged.
    ///
    /// The file is read and merged without holding the cache lock. If two
    /// callers race on the same name, the first insert wins and both get
    /// the same `Arc`.
    pub fn get(&self, name: &str) -> Result<Arc<Plate>, PlateError> {
        if let Some(plate) = self.lock().get(name) {
            return Ok(Arc::clone(plate));
        }

        let mut chain = Vec::new();
        let resolved = Arc::new(self.resolve(name, &mut chain)?);
        debug!(plate = name, depth = chain.len(), "resolved plate");

        let mut cache = self.lock();
        let entry = cache.entry(name.to_string()).or_insert(resolved);
        Ok(Arc::clone(entry))
    }

    fn resolve(&self, name: &str, chain: &mut Vec<String>) -> Result<Plate, PlateError> {
        if chain.iter().any(|seen| seen == name) {
            chain.push(name.to_string());
            return Err(PlateError::Cycle(chain.clone()));
        }
        chain.push(name.to_string());

        let mut plate = self.read(name)?;
        if let Some(parent_name) = plate.extends.clone().filter(|p| !p.is_empty()) {
            let parent = self.resolve(&parent_name, chain)?;
            plate = plate.inherit(&parent);
        }
        plate.drop_empty_fragments();
        Ok(plate)
    }

    fn read(&self, name: &str) -> Result<Plate, PlateError> {
        let path = self.plate_path(name);
        if !path.exists() {
            return Err(PlateError::Missing {
                name: name.to_string(),
                path,
            });
        }
        let content = fs::read_to_string(&path).map_err(|source| PlateError::Io {
            name: name.to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| PlateError::Malformed {
            name: name.to_string(),
            source,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Plate>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
