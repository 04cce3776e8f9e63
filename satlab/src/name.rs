//! Site qualification of resource names.

pub use fleet_rs::util::normalise_bot_name;

/// Prepend `<prefix>-<id>-` to `name` unless it already starts with
/// `<prefix>-<id>`. Either part being empty disables qualification.
pub fn qualify(prefix: &str, id: &str, name: &str) -> String {
    if prefix.is_empty() || id.is_empty() {
        return name.to_string();
    }
    let site = format!("{prefix}-{id}");
    if name.starts_with(&site) {
        name.to_string()
    } else {
        format!("{site}-{name}")
    }
}

/// Whether `name` names a device registered by a satlab appliance.
pub fn looks_like_site_device(name: &str) -> bool {
    normalise_bot_name(name).starts_with("satlab")
}

/// The qualifier of one appliance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub prefix: String,
    pub id: String,
}

impl Site {
    pub fn new(prefix: &str, id: &str) -> Self {
        Site {
            prefix: prefix.to_string(),
            id: id.to_string(),
        }
    }

    pub fn qualify(&self, name: &str) -> String {
        qualify(&self.prefix, &self.id, name)
    }

    /// The pool every DUT of this site joins by default.
    pub fn pool(&self) -> String {
        format!("{}-{}", self.prefix, self.id)
    }
}
