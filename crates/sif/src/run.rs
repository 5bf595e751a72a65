//! High-level driver tying the pipeline together.
//!
//! A [`Runner`] wires a reader through the parser, compiler, and virtual
//! machine, with the built-in `core` and `system` modules bound. In
//! interactive mode the runner keeps the VM and the declared signatures and
//! variables alive between inputs, so a REPL session accumulates state.

use std::{path::PathBuf, rc::Rc};

use ahash::AHashSet;

use crate::{
    ast::Statement,
    bytecode::Bytecode,
    compiler::{Compiler, CompilerConfig},
    error::Error,
    module::{Module, ModuleLoader},
    parser::{Parser, ParserConfig},
    reader::{Reader, StringReader},
    reporter::CaptureReporter,
    signature::Signature,
    value::Value,
    vm::{VirtualMachine, VirtualMachineConfig},
};

/// Where a run failed, with the collected errors. The variants map to the
/// process exit codes 1, 2, and 3.
#[derive(Debug)]
pub enum RunFailure {
    Parse(Vec<Error>),
    Compile(Vec<Error>),
    Runtime(Error),
}

impl RunFailure {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Parse(_) => 1,
            Self::Compile(_) => 2,
            Self::Runtime(_) => 3,
        }
    }

    #[must_use]
    pub fn errors(&self) -> Vec<Error> {
        match self {
            Self::Parse(errors) | Self::Compile(errors) => errors.clone(),
            Self::Runtime(error) => vec![error.clone()],
        }
    }
}

pub struct RunnerConfig {
    pub file_name: String,
    pub interactive: bool,
    pub enable_debug_info: bool,
    pub search_paths: Vec<PathBuf>,
    pub vm: VirtualMachineConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            file_name: "<stdin>".to_string(),
            interactive: false,
            enable_debug_info: true,
            search_paths: Vec::new(),
            vm: VirtualMachineConfig::default(),
        }
    }
}

pub struct Runner {
    config: RunnerConfig,
    loader: ModuleLoader,
    vm: VirtualMachine,
    /// Signatures carried across interactive inputs, deduplicated by name.
    session_signatures: Vec<Signature>,
    session_variables: AHashSet<String>,
}

impl Runner {
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        let loader = ModuleLoader::new(config.search_paths.clone(), config.vm.clone());
        let mut vm = VirtualMachine::new(config.vm.clone());
        let core = loader.core();
        let system = loader.system();
        vm.add_globals(core.values().iter().cloned());
        vm.add_globals(system.values().iter().cloned());

        let mut session_signatures = Vec::new();
        session_signatures.extend_from_slice(core.signatures());
        session_signatures.extend_from_slice(system.signatures());

        Self {
            config,
            loader,
            vm,
            session_signatures,
            session_variables: AHashSet::new(),
        }
    }

    #[must_use]
    pub fn vm(&mut self) -> &mut VirtualMachine {
        &mut self.vm
    }

    /// Parses a program without compiling it.
    pub fn parse(&mut self, reader: &mut dyn Reader) -> Result<Statement, RunFailure> {
        self.parse_with(reader).map(|(statement, _)| statement)
    }

    /// Parses and compiles a program without executing it.
    pub fn compile(&mut self, reader: &mut dyn Reader) -> Result<Bytecode, RunFailure> {
        let (statement, _) = self.parse_with(reader)?;
        self.compile_statement(&statement)
    }

    /// Runs a program end to end, returning its result value.
    pub fn run(&mut self, reader: &mut dyn Reader) -> Result<Value, RunFailure> {
        let (statement, session) = self.parse_with(reader)?;
        let bytecode = self.compile_statement(&statement)?;
        if self.config.interactive {
            self.remember_session(session);
        }
        self.vm
            .execute(Rc::new(bytecode))
            .map_err(RunFailure::Runtime)
    }

    /// Convenience for running an in-memory source string.
    pub fn run_source(&mut self, source: &str) -> Result<Value, RunFailure> {
        let mut reader = StringReader::new(source);
        self.run(&mut reader)
    }

    fn parse_with(
        &mut self,
        reader: &mut dyn Reader,
    ) -> Result<(Statement, (Vec<Signature>, AHashSet<String>)), RunFailure> {
        let mut reporter = CaptureReporter::new();
        let parser_config = ParserConfig {
            file_name: self.config.file_name.clone(),
        };
        let mut parser = Parser::new(parser_config, reader, &mut reporter, &self.loader);
        parser.declare_signatures(&self.session_signatures);
        for variable in &self.session_variables {
            parser.declare_variable(variable);
        }

        let statement = parser.statement();
        let failed = parser.failed();
        let session = (parser.signatures().to_vec(), parser.variables().clone());
        drop(parser);

        match statement {
            Some(statement) if !failed => Ok((statement, session)),
            _ => Err(RunFailure::Parse(reporter.into_errors())),
        }
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<Bytecode, RunFailure> {
        let mut reporter = CaptureReporter::new();
        let compiler_config = CompilerConfig {
            interactive: self.config.interactive,
            enable_debug_info: self.config.enable_debug_info,
        };
        let mut compiler = Compiler::new(compiler_config, &mut reporter, &self.loader);
        match compiler.compile(statement) {
            Some(bytecode) => Ok(bytecode),
            None => Err(RunFailure::Compile(reporter.into_errors())),
        }
    }

    fn remember_session(&mut self, session: (Vec<Signature>, AHashSet<String>)) {
        let (signatures, variables) = session;
        for signature in signatures {
            if !self.session_signatures.contains(&signature) {
                self.session_signatures.push(signature);
            }
        }
        self.session_variables.extend(variables);
    }
}
