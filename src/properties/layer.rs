use std::collections::{BTreeSet, HashMap};

/// How a layer's keys are expressed and matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Dot-separated property paths from files, defaults, or code.
    Standard,
    /// Process-environment style names (`A_B_C`). Environment names cannot
    /// carry dots or hyphens, so these layers are matched by deriving the
    /// candidate name from the queried key instead of the other way around.
    Environment,
}

/// One precedence-ranked source of raw configuration key/values.
///
/// Keys of standard layers are canonicalized at insertion so that
/// `cargo-name`, `cargoName` and `cargo_name` all land on the same entry.
/// Within a layer keys are unique; a later pair with an equivalent key
/// replaces the earlier one.
#[derive(Debug, Clone)]
pub struct PropertyLayer {
    name: String,
    rank: i32,
    kind: LayerKind,
    values: HashMap<String, String>,
}

impl PropertyLayer {
    /// Create a standard layer from dot-separated property keys.
    pub fn new<K, V, I>(name: impl Into<String>, rank: i32, pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (canonical_key(k.as_ref()), v.into()))
            .collect();

        Self {
            name: name.into(),
            rank,
            kind: LayerKind::Standard,
            values,
        }
    }

    /// Create an environment layer. Names are kept verbatim (`A_B_C` style).
    pub fn environment<K, V, I>(name: impl Into<String>, rank: i32, vars: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let values = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        Self {
            name: name.into(),
            rank,
            kind: LayerKind::Environment,
            values,
        }
    }

    /// Layer name, used in logs and provenance reporting.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Precedence rank; higher ranks win.
    pub fn rank(&self) -> i32 {
        self.rank
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up an already-canonicalized key in this layer.
    pub(crate) fn get_canonical(&self, canonical: &str) -> Option<&str> {
        match self.kind {
            LayerKind::Standard => self.values.get(canonical).map(String::as_str),
            LayerKind::Environment => self
                .values
                .get(&env_candidate(canonical))
                .map(String::as_str),
        }
    }

    /// Collect the relative canonical keys below `prefix` defined by this
    /// layer. For environment layers the remainder maps underscores to dots,
    /// which is exact for list indices (`ZONES_0` → `0`) and a best effort
    /// for nested names.
    pub(crate) fn collect_keys_under(&self, canonical_prefix: &str, out: &mut BTreeSet<String>) {
        match self.kind {
            LayerKind::Standard => {
                let prefix = format!("{}.", canonical_prefix);
                for key in self.values.keys() {
                    if let Some(rest) = key.strip_prefix(&prefix) {
                        out.insert(rest.to_string());
                    }
                }
            }
            LayerKind::Environment => {
                let prefix = format!("{}_", env_candidate(canonical_prefix));
                for key in self.values.keys() {
                    if let Some(rest) = key.strip_prefix(&prefix) {
                        out.insert(rest.to_ascii_lowercase().replace('_', "."));
                    }
                }
            }
        }
    }
}

/// Fold a relaxed key form into the canonical lower-case dot/kebab path.
///
/// Camel humps become hyphens (`cargoName` → `cargo-name`), underscores
/// inside dotted keys become hyphens (`cargo_name` → `cargo-name`) and ASCII
/// uppercase is lowered. Dots separate path segments and pass through.
pub fn canonical_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    for (i, segment) in raw.split('.').enumerate() {
        if i > 0 {
            out.push('.');
        }
        let mut prev_lower_or_digit = false;
        for ch in segment.chars() {
            if ch == '_' || ch == '-' {
                out.push('-');
                prev_lower_or_digit = false;
            } else if ch.is_ascii_uppercase() {
                if prev_lower_or_digit {
                    out.push('-');
                }
                out.push(ch.to_ascii_lowercase());
                prev_lower_or_digit = false;
            } else {
                out.push(ch);
                prev_lower_or_digit = ch.is_ascii_lowercase() || ch.is_ascii_digit();
            }
        }
    }
    out
}

/// Derive the environment-variable candidate for a canonical key:
/// `a.b-c` → `A_B_C`.
pub fn env_candidate(canonical: &str) -> String {
    canonical
        .chars()
        .map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}
