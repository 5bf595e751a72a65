//! Modules and the module loader.
//!
//! A module is anything that exposes a set of signatures (merged into the
//! parser's grammar) and a matching set of named values (bound by the
//! compiler at `use`/`using` sites). The built-in `core` and `system`
//! catalogs implement it statically; user modules are loaded from source by
//! [`ModuleLoader`].

use std::{cell::RefCell, fmt, path::PathBuf, rc::Rc};

use ahash::{AHashMap, AHashSet};

use crate::{
    compiler::{Compiler, CompilerConfig},
    modules::{core::Core, system::System},
    parser::{Parser, ParserConfig},
    reader::{FileReader, Reader},
    reporter::CaptureReporter,
    signature::Signature,
    value::Value,
    vm::{VirtualMachine, VirtualMachineConfig},
};

/// A named set of signatures and their values.
pub trait Module {
    fn signatures(&self) -> &[Signature];
    /// Exported values, sorted by name so dependent compilation is
    /// deterministic.
    fn values(&self) -> &[(String, Value)];
}

/// Failure to produce a module for a `use`/`using` target.
#[derive(Debug, Clone)]
pub struct ModuleError {
    pub message: String,
    /// Set when the module is already mid-load, i.e. the import cycle runs
    /// back through the requesting module.
    pub circular: bool,
}

impl ModuleError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            circular: false,
        }
    }
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Resolves `use`/`using` targets during parsing and compilation.
///
/// Takes `&self`: a loader is borrowed by the parser and the compiler at the
/// same time, and module loading recurses through it.
pub trait ModuleProvider {
    fn module(&self, source: &str) -> Result<Rc<UserModule>, ModuleError>;
}

/// A provider that refuses every import. Used where modules are out of
/// reach, e.g. parsing a bare signature string.
pub struct NoModules;

impl ModuleProvider for NoModules {
    fn module(&self, source: &str) -> Result<Rc<UserModule>, ModuleError> {
        Err(ModuleError::new(format!("unable to load module \"{source}\"")))
    }
}

/// A module compiled and executed from source.
#[derive(Debug)]
pub struct UserModule {
    name: String,
    signatures: Vec<Signature>,
    values: Vec<(String, Value)>,
}

impl UserModule {
    #[must_use]
    pub fn new(name: String, signatures: Vec<Signature>, mut values: Vec<(String, Value)>) -> Self {
        values.sort_by(|lhs, rhs| lhs.0.cmp(&rhs.0));
        Self {
            name,
            signatures,
            values,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Module for UserModule {
    fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    fn values(&self) -> &[(String, Value)] {
        &self.values
    }
}

#[derive(Default)]
struct LoaderState {
    loading: AHashSet<String>,
    cache: AHashMap<String, Rc<UserModule>>,
}

/// Locates, parses, compiles, executes, and caches user modules.
pub struct ModuleLoader {
    search_paths: Vec<PathBuf>,
    vm_config: VirtualMachineConfig,
    core: Rc<Core>,
    system: Rc<System>,
    state: RefCell<LoaderState>,
}

impl ModuleLoader {
    #[must_use]
    pub fn new(search_paths: Vec<PathBuf>, vm_config: VirtualMachineConfig) -> Self {
        Self {
            search_paths,
            vm_config,
            core: Rc::new(Core::new()),
            system: Rc::new(System::new()),
            state: RefCell::new(LoaderState::default()),
        }
    }

    /// The built-in `core` module shared by everything this loader loads.
    #[must_use]
    pub fn core(&self) -> Rc<Core> {
        Rc::clone(&self.core)
    }

    /// The built-in `system` module shared by everything this loader loads.
    #[must_use]
    pub fn system(&self) -> Rc<System> {
        Rc::clone(&self.system)
    }

    /// Resolves a module name against the search paths.
    fn resolve(&self, source: &str) -> Option<PathBuf> {
        let mut candidates = Vec::new();
        let name = PathBuf::from(source);
        candidates.push(name.clone());
        if name.extension().is_none() {
            candidates.push(name.with_extension("sif"));
        }
        for candidate in &candidates {
            if candidate.is_file() {
                return Some(candidate.clone());
            }
            for search_path in &self.search_paths {
                let joined = search_path.join(candidate);
                if joined.is_file() {
                    return Some(joined);
                }
            }
        }
        None
    }

    fn load(&self, source: &str) -> Result<Rc<UserModule>, ModuleError> {
        let Some(path) = self.resolve(source) else {
            return Err(ModuleError::new(format!(
                "unable to find module \"{source}\""
            )));
        };

        self.state.borrow_mut().loading.insert(source.to_string());
        let result = self.load_path(source, &path);
        self.state.borrow_mut().loading.remove(source);
        result
    }

    fn load_path(&self, source: &str, path: &PathBuf) -> Result<Rc<UserModule>, ModuleError> {
        let mut reader = FileReader::new(path);
        if let Err(error) = reader.read(0) {
            return Err(ModuleError::new(format!(
                "unable to read module \"{source}\": {error}"
            )));
        }

        let mut reporter = CaptureReporter::new();
        let config = ParserConfig {
            file_name: path.display().to_string(),
        };
        let mut parser = Parser::new(config, &mut reader, &mut reporter, self);
        parser.declare_signatures(self.core.signatures());
        parser.declare_signatures(self.system.signatures());

        let statement = parser.statement();
        let declarations = parser.declarations().to_vec();
        let failed = parser.failed();
        drop(parser);
        let Some(statement) = statement.filter(|_| !failed) else {
            return Err(first_error(&reporter, source, "parse"));
        };

        let mut compile_reporter = CaptureReporter::new();
        let compiler_config = CompilerConfig {
            interactive: false,
            enable_debug_info: true,
        };
        let mut compiler = Compiler::new(compiler_config, &mut compile_reporter, self);
        let Some(bytecode) = compiler.compile(&statement) else {
            return Err(first_error(&compile_reporter, source, "compile"));
        };
        let globals = compiler.globals().clone();

        let mut vm = VirtualMachine::new(self.vm_config.clone());
        for (name, value) in self.core.values().iter().chain(self.system.values()) {
            if globals.contains(name) {
                vm.add_global(name.clone(), value.clone());
            }
        }

        if let Err(error) = vm.execute(Rc::new(bytecode)) {
            return Err(ModuleError::new(format!(
                "error in module \"{source}\": {}",
                error.what()
            )));
        }

        let module = Rc::new(UserModule::new(
            source.to_string(),
            declarations,
            vm.exports().clone().into_iter().collect(),
        ));
        self.state
            .borrow_mut()
            .cache
            .insert(source.to_string(), Rc::clone(&module));
        Ok(module)
    }
}

fn first_error(reporter: &CaptureReporter, source: &str, stage: &str) -> ModuleError {
    match reporter.errors().first() {
        Some(error) => ModuleError::new(format!(
            "failed to {stage} module \"{source}\": {}",
            error.what()
        )),
        None => ModuleError::new(format!("failed to {stage} module \"{source}\"")),
    }
}

impl ModuleProvider for ModuleLoader {
    fn module(&self, source: &str) -> Result<Rc<UserModule>, ModuleError> {
        {
            let state = self.state.borrow();
            if state.loading.contains(source) {
                return Err(ModuleError {
                    message: format!("circular use of module \"{source}\""),
                    circular: true,
                });
            }
            if let Some(module) = state.cache.get(source) {
                return Ok(Rc::clone(module));
            }
        }
        self.load(source)
    }
}
