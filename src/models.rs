// Resource types mirrored from the doarama API, plus the purely local
// visualisation URL rendering. Field names follow the JSON the service
// sends; see `client` for the requests that produce these.

use serde::{Deserialize, Serialize};

/// A single uploaded GPS track on the remote service.
///
/// An `Activity` is only a handle: it is meaningful in the context of the
/// client/session that created or referenced it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Activity {
    /// Server-assigned activity id.
    pub id: i64,
}

/// Mutable metadata attached to an activity after creation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivityInfo {
    /// Activity type id, as enumerated by `Client::activity_types`.
    #[serde(rename = "activityTypeId")]
    pub type_id: i64,
}

/// An (id, name) pair describing a category of activity, e.g. "Fly
/// Paraglide". Enumerated read-only from the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActivityType {
    pub id: i64,
    pub name: String,
}

/// A remote resource compositing one or more activities into a shareable
/// rendered view, identified by an opaque key. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Visualisation {
    /// Opaque server-assigned key.
    pub key: String,
}

/// Optional display parameters for a visualisation URL.
///
/// Every field is independently optional: an unset field contributes no
/// query parameter at all, which tells the service to use its own default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisualisationUrlOptions {
    /// Per-activity display names, in the same order as the activities in
    /// the visualisation.
    pub names: Vec<String>,
    /// Per-activity avatar image references, in activity order.
    pub avatars: Vec<String>,
    /// Base URL prepended to relative avatar references.
    pub avatar_base_url: Option<String>,
    /// Lock the rendering aspect ratio.
    pub fixed_aspect: bool,
    /// Request a reduced-chrome rendering.
    pub minimal_view: bool,
    /// Alternate DZML markup payload reference for custom overlays.
    pub dzml: Option<String>,
}

impl VisualisationUrlOptions {
    /// Render the query parameters for the set options, in a fixed order.
    /// Returns an empty string when nothing is set.
    fn query(&self) -> String {
        let mut params: Vec<String> = Vec::new();
        let mut push = |name: &str, value: &str| {
            params.push(format!("{}={}", name, urlencoding::encode(value)));
        };
        for name in &self.names {
            push("name", name);
        }
        for avatar in &self.avatars {
            push("avatar", avatar);
        }
        if let Some(base) = &self.avatar_base_url {
            push("avatarBaseUrl", base);
        }
        if self.fixed_aspect {
            push("fixedAspect", "true");
        }
        if self.minimal_view {
            push("minimalView", "true");
        }
        if let Some(dzml) = &self.dzml {
            push("dzml", dzml);
        }
        params.join("&")
    }
}

impl Visualisation {
    /// Render the shareable display URL for this visualisation. Purely
    /// local: no remote call is made. With empty options the result is the
    /// bare visualisation path, with no query string.
    pub fn url(&self, base_url: &str, options: &VisualisationUrlOptions) -> String {
        let mut url = format!(
            "{}/visualisation/{}",
            base_url.trim_end_matches('/'),
            urlencoding::encode(&self.key)
        );
        let query = options.query();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        url
    }
}
