use std::{env, path::PathBuf, process::ExitCode};

use sif::{
    BasicReporter, FileReader, Reader, ReplReader, Reporter, RunFailure, Runner, RunnerConfig,
    StringReader, pretty,
};

const USAGE: &str = "\
usage: sif [options] [file] [arguments...]
  -e <code>  execute the given code
  -i         run an interactive session
  -p         pretty-print the parsed program and exit
  -b         print bytecode with source locations and exit
  -B         print bytecode without source locations and exit
  -n         disable per-argument debug info
  -h         show this help
";

struct Options {
    evaluate: Option<String>,
    interactive: bool,
    pretty_print: bool,
    bytecode: bool,
    bytecode_locations: bool,
    debug_info: bool,
    file: Option<PathBuf>,
    arguments: Vec<String>,
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        evaluate: None,
        interactive: false,
        pretty_print: false,
        bytecode: false,
        bytecode_locations: true,
        debug_info: true,
        file: None,
        arguments: Vec::new(),
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if options.file.is_some() {
            options.arguments.push(arg);
            continue;
        }
        match arg.as_str() {
            "-e" => match args.next() {
                Some(code) => options.evaluate = Some(code),
                None => return Err("-e requires an argument".to_string()),
            },
            "-i" => options.interactive = true,
            "-p" => options.pretty_print = true,
            "-b" => options.bytecode = true,
            "-B" => {
                options.bytecode = true;
                options.bytecode_locations = false;
            }
            "-n" => options.debug_info = false,
            "-h" => return Err(String::new()),
            _ if arg.starts_with('-') => return Err(format!("unknown option {arg}")),
            _ => options.file = Some(PathBuf::from(arg)),
        }
    }
    Ok(options)
}

fn main() -> ExitCode {
    let options = match parse_options() {
        Ok(options) => options,
        Err(message) => {
            if message.is_empty() {
                print!("{USAGE}");
                return ExitCode::SUCCESS;
            }
            eprintln!("sif: {message}");
            eprint!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    let mut search_paths = vec![PathBuf::from(".")];
    if let Some(directory) = options.file.as_ref().and_then(|file| file.parent().map(PathBuf::from))
    {
        search_paths.insert(0, directory);
    }

    let file_name = match (&options.evaluate, &options.file) {
        (Some(_), _) => "<stdin>".to_string(),
        (None, Some(file)) => file.display().to_string(),
        (None, None) => "<stdin>".to_string(),
    };

    let mut config = RunnerConfig {
        file_name: file_name.clone(),
        interactive: options.interactive,
        enable_debug_info: options.debug_info,
        search_paths,
        ..RunnerConfig::default()
    };
    config.vm.arguments = options.arguments.clone();

    if options.evaluate.is_none() && options.file.is_none() {
        // No input given: behave like -i.
        config.interactive = true;
        let mut runner = Runner::new(config);
        return repl(&mut runner);
    }

    let mut runner = Runner::new(config);

    let source;
    let result = if let Some(code) = &options.evaluate {
        source = code.clone();
        drive(&mut runner, &options, StringReader::new(code.clone()))
    } else {
        let file = options.file.as_ref().expect("a file or -e is present");
        let mut reader = FileReader::new(file);
        if let Err(error) = reader.read(0) {
            eprintln!("sif: unable to read {}: {error}", file.display());
            return ExitCode::FAILURE;
        }
        source = reader.contents().to_string();
        drive(&mut runner, &options, reader)
    };

    match result {
        Ok(()) => {
            if options.interactive {
                return repl(&mut runner);
            }
            ExitCode::SUCCESS
        }
        Err(failure) => {
            let mut reporter = BasicReporter::new(&file_name, &source);
            for error in failure.errors() {
                reporter.report(&error);
            }
            ExitCode::from(u8::try_from(failure.exit_code()).unwrap_or(1))
        }
    }
}

fn drive(
    runner: &mut Runner,
    options: &Options,
    mut reader: impl Reader,
) -> Result<(), RunFailure> {
    if options.pretty_print {
        let statement = runner.parse(&mut reader)?;
        print!("{}", pretty::print_statement(&statement));
        return Ok(());
    }
    if options.bytecode {
        let bytecode = runner.compile(&mut reader)?;
        let mut listing = String::new();
        bytecode
            .disassemble(&mut listing, options.bytecode_locations)
            .expect("writing to a string cannot fail");
        print!("{listing}");
        return Ok(());
    }
    runner.run(&mut reader).map(|_| ())
}

fn repl(runner: &mut Runner) -> ExitCode {
    loop {
        // One reader per input; the parser pulls continuation lines through
        // it while a block is open.
        let mut reader = ReplReader::new("> ", "... ");
        match runner.run(&mut reader) {
            Ok(value) => {
                if !value.is_empty() {
                    println!("{}", value.description());
                }
            }
            Err(failure) => {
                let mut reporter = BasicReporter::new("<stdin>", reader.contents());
                for error in failure.errors() {
                    reporter.report(&error);
                }
            }
        }
        if !reader.readable() && reader.contents().is_empty() {
            return ExitCode::SUCCESS;
        }
    }
}
