// ============================================================================
// PLUGINS — dependency-ordered editor extensions
// ============================================================================

use image::RgbaImage;
use std::collections::{BTreeSet, HashMap};

use crate::canvas::Position;
use crate::components::commands::Command;
use crate::editor::Editor;
use crate::log_info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    Duplicate(String),
    MissingDependency { plugin: String, dependency: String },
    /// Plugins that could not be ordered, in registration order.
    Cycle(Vec<String>),
    Install { plugin: String, message: String },
}

impl std::fmt::Display for PluginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginError::Duplicate(name) => write!(f, "plugin '{}' is already registered", name),
            PluginError::MissingDependency { plugin, dependency } => write!(
                f,
                "plugin '{}' requires '{}', which is not registered",
                plugin, dependency
            ),
            PluginError::Cycle(names) => {
                write!(f, "dependency cycle between plugins: {}", names.join(", "))
            }
            PluginError::Install { plugin, message } => {
                write!(f, "plugin '{}' failed to install: {}", plugin, message)
            }
        }
    }
}

impl std::error::Error for PluginError {}

/// An editor extension. `pre_install` runs for every plugin once the whole
/// dependency graph is known to be valid; `install` then runs in dependency
/// order.
pub trait Plugin: Send {
    fn name(&self) -> &str;

    /// Names of plugins that must be installed first.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    fn pre_install(&mut self, _editor: &mut Editor) {}

    fn install(&mut self, editor: &mut Editor) -> Result<(), PluginError>;
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<(), PluginError> {
        if self.plugins.iter().any(|p| p.name() == plugin.name()) {
            return Err(PluginError::Duplicate(plugin.name().to_string()));
        }
        self.plugins.push(plugin);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Plugin names in install order.
    pub fn install_order(&self) -> Result<Vec<&str>, PluginError> {
        Ok(self
            .ordered_indices()?
            .into_iter()
            .map(|i| self.plugins[i].name())
            .collect())
    }

    /// Kahn's algorithm over registration indices. The ready set is ordered,
    /// so independent plugins keep their registration order.
    fn ordered_indices(&self) -> Result<Vec<usize>, PluginError> {
        let index: HashMap<&str, usize> = self
            .plugins
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name(), i))
            .collect();

        let n = self.plugins.len();
        let mut incoming = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, plugin) in self.plugins.iter().enumerate() {
            let mut deps = plugin.dependencies();
            deps.sort();
            deps.dedup();
            for dep in deps {
                let Some(&d) = index.get(dep.as_str()) else {
                    return Err(PluginError::MissingDependency {
                        plugin: plugin.name().to_string(),
                        dependency: dep,
                    });
                };
                incoming[i] += 1;
                dependents[d].push(i);
            }
        }

        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| incoming[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &next in &dependents[i] {
                incoming[next] -= 1;
                if incoming[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if order.len() < n {
            let stuck = (0..n)
                .filter(|&i| incoming[i] > 0)
                .map(|i| self.plugins[i].name().to_string())
                .collect();
            return Err(PluginError::Cycle(stuck));
        }
        Ok(order)
    }

    /// Validate the graph, run every `pre_install`, then every `install` in
    /// dependency order. Nothing runs when the graph is invalid.
    pub fn install_all(&mut self, editor: &mut Editor) -> Result<(), PluginError> {
        let order = self.ordered_indices()?;

        for plugin in &mut self.plugins {
            plugin.pre_install(editor);
        }
        for i in order {
            let plugin = &mut self.plugins[i];
            plugin.install(editor)?;
            log_info!("Installed plugin '{}'", plugin.name());
        }
        Ok(())
    }
}

// ============================================================================
// BACKDROP — an image placed under every edit
// ============================================================================

/// Installs an image as a setup command, so it is redrawn by every replay.
pub struct Backdrop {
    image: Option<RgbaImage>,
    offset: Position,
}

impl Backdrop {
    pub fn new(image: RgbaImage) -> Self {
        Self::at(image, Position::new(0, 0))
    }

    pub fn at(image: RgbaImage, offset: Position) -> Self {
        Self {
            image: Some(image),
            offset,
        }
    }
}

impl Plugin for Backdrop {
    fn name(&self) -> &str {
        "backdrop"
    }

    fn install(&mut self, editor: &mut Editor) -> Result<(), PluginError> {
        let image = self.image.take().ok_or_else(|| PluginError::Install {
            plugin: self.name().to_string(),
            message: "already installed".to_string(),
        })?;
        editor
            .add_setup_command(Command::paste_at(image, self.offset))
            .map_err(|e| PluginError::Install {
                plugin: self.name().to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::sync::{Arc, Mutex};

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        deps: Vec<&'static str>,
        journal: Journal,
    }

    impl Plugin for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn dependencies(&self) -> Vec<String> {
            self.deps.iter().map(|d| d.to_string()).collect()
        }

        fn pre_install(&mut self, _editor: &mut Editor) {
            self.journal.lock().unwrap().push(format!("pre:{}", self.name));
        }

        fn install(&mut self, _editor: &mut Editor) -> Result<(), PluginError> {
            self.journal.lock().unwrap().push(format!("install:{}", self.name));
            Ok(())
        }
    }

    fn registry(specs: &[(&'static str, &[&'static str])]) -> (PluginRegistry, Journal) {
        let journal = Journal::default();
        let mut reg = PluginRegistry::new();
        for &(name, deps) in specs {
            reg.register(Box::new(Recorder {
                name,
                deps: deps.to_vec(),
                journal: Arc::clone(&journal),
            }))
            .unwrap();
        }
        (reg, journal)
    }

    #[test]
    fn dependencies_install_first() {
        let (reg, _) = registry(&[("ui", &["canvas", "palette"]), ("palette", &["canvas"]), ("canvas", &[])]);
        assert_eq!(reg.install_order().unwrap(), vec!["canvas", "palette", "ui"]);
    }

    #[test]
    fn independent_plugins_keep_registration_order() {
        let (reg, _) = registry(&[("c", &[]), ("a", &[]), ("b", &["c"])]);
        assert_eq!(reg.install_order().unwrap(), vec!["c", "a", "b"]);
    }

    #[test]
    fn missing_dependency_is_reported() {
        let (reg, _) = registry(&[("a", &["ghost"])]);
        assert_eq!(
            reg.install_order(),
            Err(PluginError::MissingDependency {
                plugin: "a".into(),
                dependency: "ghost".into()
            })
        );
    }

    #[test]
    fn cycles_are_reported_and_nothing_installs() {
        let (mut reg, journal) = registry(&[("a", &["b"]), ("b", &["a"]), ("c", &[])]);
        let mut editor = Editor::new(1, 1);
        assert_eq!(
            reg.install_all(&mut editor),
            Err(PluginError::Cycle(vec!["a".into(), "b".into()]))
        );
        assert!(journal.lock().unwrap().is_empty());
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut reg = PluginRegistry::new();
        reg.register(Box::new(Backdrop::new(RgbaImage::new(1, 1)))).unwrap();
        assert_eq!(
            reg.register(Box::new(Backdrop::new(RgbaImage::new(1, 1)))),
            Err(PluginError::Duplicate("backdrop".into()))
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn every_pre_install_runs_before_any_install() {
        let (mut reg, journal) = registry(&[("b", &["a"]), ("a", &[])]);
        reg.install_all(&mut Editor::new(1, 1)).unwrap();
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["pre:b", "pre:a", "install:a", "install:b"]
        );
    }

    #[test]
    fn backdrop_becomes_a_setup_command() {
        let blue = Rgba([0, 0, 255, 255]);
        let mut reg = PluginRegistry::new();
        reg.register(Box::new(Backdrop::at(RgbaImage::from_pixel(2, 2, blue), Position::new(1, 1))))
            .unwrap();
        let mut editor = Editor::new(3, 3);
        reg.install_all(&mut editor).unwrap();
        editor.replay_commands();
        assert_eq!(editor.history().setup_commands().len(), 1);
        assert_eq!(editor.surface().opaque_pixel_count(), 4);
        assert_eq!(editor.pick_color(Position::new(2, 2)), blue);

        // A second install has nothing left to place
        assert!(matches!(reg.install_all(&mut editor), Err(PluginError::Install { .. })));
    }

    #[test]
    fn backdrop_after_an_edit_fails_to_install() {
        let mut editor = Editor::new(2, 2);
        editor
            .execute_and_record(Command::pencil(Rgba([255, 0, 0, 255]), Position::new(0, 0)))
            .unwrap();
        let mut reg = PluginRegistry::new();
        reg.register(Box::new(Backdrop::new(RgbaImage::new(2, 2)))).unwrap();
        let err = reg.install_all(&mut editor).unwrap_err();
        assert!(matches!(err, PluginError::Install { ref plugin, .. } if plugin == "backdrop"));
        assert!(editor.history().setup_commands().is_empty());
    }
}
