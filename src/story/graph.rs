use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use log::{info, warn};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::error::LoadError;
use crate::story::scene::{Action, Check, Choice, Ending, Scene, SceneId, SceneTag};

/// Entry point used when the document does not name one.
pub const DEFAULT_START: SceneId = SceneId(1);

const DEFAULT_TITLE: &str = "Adventure";

// ---------------------------------------------------------------------------
// Document format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StoryDocument {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    start: Option<SceneId>,
    #[serde(default, deserialize_with = "unique_keys")]
    scenes: BTreeMap<SceneId, RawScene>,
}

#[derive(Debug, Deserialize)]
struct RawScene {
    // Optional here so a missing field reports the scene id.
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    ending: Option<Ending>,
    #[serde(default)]
    tag: Option<SceneTag>,
    /// Each entry is a single-key mapping: `label: action`.
    #[serde(default)]
    choices: Vec<ChoiceEntry>,
}

#[derive(Debug)]
struct ChoiceEntry(BTreeMap<String, RawAction>);

impl<'de> Deserialize<'de> for ChoiceEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        unique_keys(deserializer).map(ChoiceEntry)
    }
}

/// Deserialize a mapping, failing on a repeated key instead of keeping the last value.
fn unique_keys<'de, D, K, V>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
where
    D: Deserializer<'de>,
    K: Deserialize<'de> + Ord + fmt::Display,
    V: Deserialize<'de>,
{
    struct UniqueKeys<K, V>(PhantomData<(K, V)>);

    impl<'de, K, V> Visitor<'de> for UniqueKeys<K, V>
    where
        K: Deserialize<'de> + Ord + fmt::Display,
        V: Deserialize<'de>,
    {
        type Value = BTreeMap<K, V>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping with unique keys")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut map = BTreeMap::new();
            while let Some(key) = access.next_key::<K>()? {
                if map.contains_key(&key) {
                    return Err(de::Error::custom(format_args!("duplicate key `{key}`")));
                }
                let value = access.next_value()?;
                map.insert(key, value);
            }
            Ok(map)
        }
    }

    deserializer.deserialize_map(UniqueKeys(PhantomData))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAction {
    Goto(SceneId),
    Check {
        roll_needed: u32,
        succeed: SceneId,
        fail: SceneId,
    },
}

impl From<RawAction> for Action {
    fn from(raw: RawAction) -> Self {
        match raw {
            RawAction::Goto(target) => Action::Goto(target),
            RawAction::Check {
                roll_needed,
                succeed,
                fail,
            } => Action::Check(Check {
                roll_needed,
                succeed,
                fail,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Scene graph
// ---------------------------------------------------------------------------

/// The full story: a validated map of scene-id -> Scene. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    title: String,
    start: SceneId,
    scenes: BTreeMap<SceneId, Scene>,
}

impl SceneGraph {
    pub fn from_yaml_str(source: &str) -> Result<Self, LoadError> {
        let document: StoryDocument = serde_yaml::from_str(source)?;
        Self::from_document(document)
    }

    pub fn from_json_str(source: &str) -> Result<Self, LoadError> {
        let document: StoryDocument = serde_json::from_str(source)?;
        Self::from_document(document)
    }

    /// Load a story file, choosing the parser from the file extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let parse: fn(&str) -> Result<Self, LoadError> = match extension.as_deref() {
            Some("yaml" | "yml") => Self::from_yaml_str,
            Some("json") => Self::from_json_str,
            _ => return Err(LoadError::UnsupportedFormat(path.to_path_buf())),
        };

        let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Loading story from {}", path.display());
        parse(&source)
    }

    /// Replace the entry point. Fails if the scene does not exist.
    pub fn with_start(mut self, start: SceneId) -> Result<Self, LoadError> {
        if !self.scenes.contains_key(&start) {
            return Err(LoadError::UnknownStart(start));
        }
        self.start = start;
        Ok(self)
    }

    fn from_document(document: StoryDocument) -> Result<Self, LoadError> {
        if document.scenes.is_empty() {
            return Err(LoadError::Empty);
        }

        let mut scenes = BTreeMap::new();
        for (id, raw) in document.scenes {
            if id.0 == 0 {
                return Err(LoadError::InvalidSceneId);
            }
            scenes.insert(id, build_scene(id, raw)?);
        }

        for (id, scene) in &scenes {
            for choice in &scene.choices {
                for target in choice.action.targets() {
                    if !scenes.contains_key(&target) {
                        return Err(LoadError::DanglingReference { from: *id, target });
                    }
                }
            }
        }

        let start = document.start.unwrap_or(DEFAULT_START);
        if !scenes.contains_key(&start) {
            return Err(LoadError::UnknownStart(start));
        }

        let graph = Self {
            title: document.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            start,
            scenes,
        };

        info!(
            "Loaded story '{}': {} scenes, {} checks, {} endings, start at {}",
            graph.title,
            graph.len(),
            graph.check_count(),
            graph.ending_count(),
            graph.start
        );
        for id in graph.unreachable() {
            warn!("Scene {id} cannot be reached from scene {}", graph.start);
        }

        Ok(graph)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn start(&self) -> SceneId {
        self.start
    }

    pub fn get(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Scenes in ascending id order.
    pub fn scenes(&self) -> impl Iterator<Item = (SceneId, &Scene)> {
        self.scenes.iter().map(|(id, scene)| (*id, scene))
    }

    pub fn check_count(&self) -> usize {
        self.scenes()
            .flat_map(|(_, scene)| &scene.choices)
            .filter(|choice| matches!(choice.action, Action::Check(_)))
            .count()
    }

    pub fn ending_count(&self) -> usize {
        self.scenes()
            .filter(|(_, scene)| scene.ending.is_some())
            .count()
    }

    /// Scenes that no sequence of choices from the start scene can reach.
    pub fn unreachable(&self) -> Vec<SceneId> {
        let mut seen = BTreeSet::from([self.start]);
        let mut queue = VecDeque::from([self.start]);

        while let Some(id) = queue.pop_front() {
            let Some(scene) = self.scenes.get(&id) else {
                continue;
            };
            for target in scene.choices.iter().flat_map(|c| c.action.targets()) {
                if seen.insert(target) {
                    queue.push_back(target);
                }
            }
        }

        self.scenes
            .keys()
            .filter(|id| !seen.contains(id))
            .copied()
            .collect()
    }
}

fn build_scene(id: SceneId, raw: RawScene) -> Result<Scene, LoadError> {
    let text = raw.text.ok_or(LoadError::MissingText(id))?;

    let mut choices = Vec::with_capacity(raw.choices.len());
    for (index, ChoiceEntry(entry)) in raw.choices.into_iter().enumerate() {
        let keys = entry.len();
        let mut entry = entry.into_iter();
        match (entry.next(), keys) {
            (Some((label, action)), 1) => choices.push(Choice {
                label,
                action: action.into(),
            }),
            _ => return Err(LoadError::MalformedChoice { scene: id, index, keys }),
        }
    }

    if raw.ending.is_some() && !choices.is_empty() {
        warn!(
            "Scene {id} has an ending; ignoring its {} choices",
            choices.len()
        );
        choices.clear();
    }

    Ok(Scene {
        text,
        image: raw.image,
        ending: raw.ending,
        tag: raw.tag,
        choices,
    })
}
