//! Backend-native filter fragments.
//!
//! Conditions compile to a [`Fragment`] in one of two dialects. List
//! producers splice the fragment into their filter clause ahead of sort and
//! pagination so unreadable rows never leave the backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  Matching Read-granting policies     │
//! │  (role set × resource type)          │
//! └───────────────┬─────────────────────┘
//!                 │ group by condition kind, union
//!                 ▼
//! ┌─────────────────────────────────────┐
//! │  Condition::compile_for(backend)     │
//! │  - Cypher: node.id = $currentUser    │
//! │  - EdgeQL: .id = global currentActor │
//! └───────────────┬─────────────────────┘
//!                 │ OR, then wrap_context
//!                 ▼
//! ┌─────────────────────────────────────┐
//! │  Fragment                            │
//! │  MATCH (node:Project)                │
//! │  WHERE <fragment> ... SKIP/LIMIT     │
//! └─────────────────────────────────────┘
//! ```

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

/// A persistence backend dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Property-graph pattern/predicate language.
    Cypher,
    /// Schema-typed graph query language.
    EdgeQl,
}

impl Backend {
    pub const ALL: [Backend; 2] = [Backend::Cypher, Backend::EdgeQl];

    fn or_keyword(self) -> &'static str {
        match self {
            Backend::Cypher => "OR",
            Backend::EdgeQl => "or",
        }
    }

    fn and_keyword(self) -> &'static str {
        match self {
            Backend::Cypher => "AND",
            Backend::EdgeQl => "and",
        }
    }

    /// Quotes a string literal for this dialect.
    pub fn quote(self, value: &str) -> String {
        // Both dialects accept single-quoted literals with backslash escapes.
        let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
        format!("'{escaped}'")
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Cypher => f.write_str("cypher"),
            Backend::EdgeQl => f.write_str("edgeql"),
        }
    }
}

/// Variable names a fragment is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bindings {
    /// The row/node under test. Empty means the implicit path subject.
    pub row: String,
    /// Ancestor that scoping conditions read from. Defaults to `row`.
    pub scope: Option<String>,
    /// Expression holding the current actor id.
    pub actor: String,
}

impl Bindings {
    /// The agreed default bindings for `backend`.
    pub fn for_backend(backend: Backend) -> Self {
        match backend {
            Backend::Cypher => Self {
                row: "node".to_string(),
                scope: None,
                actor: "$currentUser".to_string(),
            },
            Backend::EdgeQl => Self {
                row: String::new(),
                scope: None,
                actor: "global currentActorId".to_string(),
            },
        }
    }

    /// Redirects scoping conditions to `scope`.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// `row.property`
    pub fn row_path(&self, property: &str) -> String {
        format!("{}.{property}", self.row)
    }

    /// `scope.property`, falling back to the row.
    pub fn scope_path(&self, property: &str) -> String {
        format!("{}.{property}", self.scope_var())
    }

    pub fn scope_var(&self) -> &str {
        self.scope.as_deref().unwrap_or(&self.row)
    }
}

/// A compiled predicate in one backend dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    backend: Backend,
    text: String,
    stub: bool,
}

impl Fragment {
    pub fn new(backend: Backend, text: impl Into<String>) -> Self {
        Self {
            backend,
            text: text.into(),
            stub: false,
        }
    }

    pub fn constant(backend: Backend, value: bool) -> Self {
        Self::new(backend, if value { "true" } else { "false" })
    }

    /// Fail-closed placeholder for a translation that does not exist yet.
    pub fn stub(backend: Backend) -> Self {
        Self {
            stub: true,
            ..Self::constant(backend, false)
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns whether this fragment (or any part of it) is a stub.
    pub fn is_stub(&self) -> bool {
        self.stub
    }

    pub fn is_true(&self) -> bool {
        self.text == "true"
    }

    pub fn is_false(&self) -> bool {
        self.text == "false"
    }

    /// Rewrites the text, keeping the dialect and stub tag.
    pub fn map(self, f: impl FnOnce(String) -> String) -> Self {
        Self {
            text: f(self.text),
            ..self
        }
    }

    /// Disjunction. Empty input is `false`.
    pub fn any(backend: Backend, parts: impl IntoIterator<Item = Fragment>) -> Fragment {
        Self::join(backend, parts, false)
    }

    /// Conjunction. Empty input is `true`.
    pub fn all(backend: Backend, parts: impl IntoIterator<Item = Fragment>) -> Fragment {
        Self::join(backend, parts, true)
    }

    fn join(backend: Backend, parts: impl IntoIterator<Item = Fragment>, conjunction: bool) -> Fragment {
        let mut stub = false;
        let mut kept = Vec::new();
        for part in parts {
            debug_assert_eq!(part.backend, backend, "mixed dialects in one fragment");
            stub |= part.stub;
            // Identity elements drop out, absorbing elements decide the result
            if (conjunction && part.is_true()) || (!conjunction && part.is_false()) {
                continue;
            }
            if (conjunction && part.is_false()) || (!conjunction && part.is_true()) {
                return Fragment {
                    stub,
                    ..Fragment::constant(backend, !conjunction)
                };
            }
            kept.push(part.text);
        }

        let text = match kept.len() {
            0 => return Fragment { stub, ..Fragment::constant(backend, conjunction) },
            1 => kept.remove(0),
            _ => {
                let keyword = if conjunction {
                    backend.and_keyword()
                } else {
                    backend.or_keyword()
                };
                kept.iter()
                    .map(|t| format!("({t})"))
                    .collect::<Vec<_>>()
                    .join(&format!(" {keyword} "))
            }
        };

        Fragment {
            backend,
            text,
            stub,
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Service-wide defaults applied when [`FilterOptions`] leaves them unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDefaults {
    pub backend: Backend,
    pub bindings: BTreeMap<Backend, Bindings>,
}

impl FilterDefaults {
    /// Configured bindings for `backend`, else the agreed defaults.
    pub fn bindings_for(&self, backend: Backend) -> Bindings {
        self.bindings
            .get(&backend)
            .cloned()
            .unwrap_or_else(|| Bindings::for_backend(backend))
    }
}

impl Default for FilterDefaults {
    fn default() -> Self {
        Self {
            backend: Backend::Cypher,
            bindings: Backend::ALL
                .into_iter()
                .map(|backend| (backend, Bindings::for_backend(backend)))
                .collect(),
        }
    }
}

/// Hook that rebinds a fragment to a scoping ancestor.
pub type WrapContext = Arc<dyn Fn(Fragment) -> Fragment + Send + Sync>;

/// Options for [`crate::ResourcePrivileges::filter_to_readable`].
#[derive(Clone, Default)]
pub struct FilterOptions {
    pub(crate) backend: Option<Backend>,
    pub(crate) bindings: Option<Bindings>,
    pub(crate) scope: Option<String>,
    pub(crate) wrap_context: Option<WrapContext>,
}

impl FilterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the default backend.
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Overrides the variable bindings.
    pub fn bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = Some(bindings);
        self
    }

    /// Reads ancestor-referencing conditions from `scope` instead of the row.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Wraps the compiled fragment, e.g. in a pattern reaching the ancestor.
    pub fn wrap_context(
        mut self,
        wrap: impl Fn(Fragment) -> Fragment + Send + Sync + 'static,
    ) -> Self {
        self.wrap_context = Some(Arc::new(wrap));
        self
    }
}

impl fmt::Debug for FilterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterOptions")
            .field("backend", &self.backend)
            .field("bindings", &self.bindings)
            .field("scope", &self.scope)
            .field("wrap_context", &self.wrap_context.is_some())
            .finish()
    }
}
