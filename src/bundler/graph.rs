//! Module graph data structures

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::config::LoaderKind;

/// Unique identifier for a module
pub type ModuleId = usize;

/// How a module is processed, decided by the rule set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleType {
    /// JavaScript handled natively
    Script,
    /// JSON handled natively
    Json,
    /// Stylesheet run through its rule's steps
    Stylesheet { loaders: Vec<LoaderKind> },
    /// File copied to the output under a rendered name
    Asset { filename: String },
}

impl ModuleType {
    /// Whether dependencies are discovered by scanning the source for imports
    pub fn is_script(&self) -> bool {
        matches!(self, ModuleType::Script)
    }
}

/// The result of running a module through its processing chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOutput {
    /// Script code with imports rewritten to the bundle runtime
    Script(String),
    /// JSON text exported as a value
    Json(String),
    /// CSS handed to the extract-css plugin, with remote `@import` rules
    /// kept apart so they can lead the extracted file
    Stylesheet { css: String, imports: Vec<String> },
    /// Emitted file: output name relative to the output directory
    Asset { name: String, content: Vec<u8> },
}

/// A module in the dependency graph
#[derive(Debug, Clone)]
pub struct Module {
    /// Absolute path to the module
    pub path: PathBuf,

    /// Stable identifier: the path relative to the project root
    pub name: String,

    /// Source text (empty for assets, which are read as bytes)
    pub source: String,

    pub module_type: ModuleType,

    /// Whether this is the entry point
    pub is_entry: bool,

    /// Import specifiers mapped to the modules they resolved to
    pub resolved: Vec<(String, ModuleId)>,

    /// Filled in by the transform phase
    pub output: Option<ModuleOutput>,
}

impl Module {
    pub fn new(path: PathBuf, name: String, source: String, module_type: ModuleType) -> Self {
        Self {
            path,
            name,
            source,
            module_type,
            is_entry: false,
            resolved: Vec::new(),
            output: None,
        }
    }
}

/// The module dependency graph.
///
/// Edges keep insertion order so traversal, and therefore the emitted
/// output, is deterministic.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    /// All modules indexed by their ID
    modules: HashMap<ModuleId, Module>,

    /// Map from path to module ID
    path_to_id: HashMap<PathBuf, ModuleId>,

    /// Dependency edges in import order
    edges: HashMap<ModuleId, Vec<ModuleId>>,

    /// Next available module ID
    next_id: ModuleId,
}

impl ModuleGraph {
    /// Create a new empty module graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module to the graph
    pub fn add_module(&mut self, module: Module) -> ModuleId {
        if let Some(&id) = self.path_to_id.get(&module.path) {
            return id;
        }

        let id = self.next_id;
        self.next_id += 1;

        self.path_to_id.insert(module.path.clone(), id);
        self.modules.insert(id, module);
        self.edges.insert(id, Vec::new());

        id
    }

    /// Add a dependency edge between modules
    pub fn add_dependency(&mut self, from: ModuleId, to: ModuleId) {
        if let Some(deps) = self.edges.get_mut(&from) {
            if !deps.contains(&to) {
                deps.push(to);
            }
        }
    }

    /// Get module ID from path
    pub fn get_module_id(&self, path: &Path) -> Option<ModuleId> {
        self.path_to_id.get(path).copied()
    }

    /// Get a module by ID
    pub fn get_module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(&id)
    }

    /// Get a mutable reference to a module
    pub fn get_module_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        self.modules.get_mut(&id)
    }

    /// Modules reachable from `start`, depth-first, each listed at its first
    /// import
    pub fn ordered_modules(&self, start: ModuleId) -> Vec<ModuleId> {
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        let mut stack = vec![start];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            result.push(id);

            if let Some(deps) = self.edges.get(&id) {
                for &dep_id in deps.iter().rev() {
                    if !visited.contains(&dep_id) {
                        stack.push(dep_id);
                    }
                }
            }
        }

        result
    }

    /// Get direct dependencies of a module
    pub fn get_dependencies(&self, id: ModuleId) -> &[ModuleId] {
        self.edges.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Total number of modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if graph is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str, module_type: ModuleType) -> Module {
        Module::new(
            PathBuf::from("/project").join(name),
            name.to_string(),
            String::new(),
            module_type,
        )
    }

    #[test]
    fn test_module_graph_basic() {
        let mut graph = ModuleGraph::new();

        let id = graph.add_module(module("frontend/index.js", ModuleType::Script));
        assert_eq!(graph.len(), 1);
        assert!(graph.get_module(id).is_some());
        assert_eq!(
            graph.get_module_id(Path::new("/project/frontend/index.js")),
            Some(id)
        );

        let again = graph.add_module(module("frontend/index.js", ModuleType::Script));
        assert_eq!(again, id);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_ordered_modules_follow_import_order() {
        let mut graph = ModuleGraph::new();
        let css = ModuleType::Stylesheet {
            loaders: vec![LoaderKind::Css, LoaderKind::Extract],
        };

        let entry = graph.add_module(module("index.js", ModuleType::Script));
        let first = graph.add_module(module("pure.css", css.clone()));
        let lib = graph.add_module(module("lib.js", ModuleType::Script));
        let nested = graph.add_module(module("nested.css", css.clone()));
        let last = graph.add_module(module("main.css", css));

        graph.add_dependency(entry, first);
        graph.add_dependency(entry, lib);
        graph.add_dependency(lib, nested);
        graph.add_dependency(lib, first);
        graph.add_dependency(entry, last);
        graph.add_dependency(entry, first);

        assert_eq!(graph.get_dependencies(entry), &[first, lib, last]);
        assert_eq!(
            graph.ordered_modules(entry),
            vec![entry, first, lib, nested, last]
        );
    }

    #[test]
    fn test_cycles_terminate() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module(module("a.js", ModuleType::Script));
        let b = graph.add_module(module("b.js", ModuleType::Script));
        graph.add_dependency(a, b);
        graph.add_dependency(b, a);

        assert_eq!(graph.ordered_modules(a), vec![a, b]);
    }
}
