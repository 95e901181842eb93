//! Command-line driver: run, list, or dump Lua chunks.

use lunara_vm::{binary_chunk, stdlib, Vm};
use std::io::Read;
use std::process::ExitCode;

const USAGE: &str = "usage: lunara [options] [script]
Available options are:
  -e stat   execute string 'stat'
  -l        list the compiled bytecode instead of running
  -o name   dump the compiled chunk to file 'name'
  -v        show version information
  --        stop handling options
  -         execute stdin";

const VERSION: &str = concat!("Lunara ", env!("CARGO_PKG_VERSION"), " -- Lua 5.3 compatible");

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let mut script: Option<String> = None;
    let mut exec_chunks: Vec<String> = Vec::new();
    let mut list_bytecode = false;
    let mut dump_to: Option<String> = None;
    let mut show_version = false;
    let mut after_dashdash = false;

    let mut i = 1;
    while i < args.len() {
        let arg = &args[i];
        if after_dashdash {
            script = Some(arg.clone());
            break;
        }
        match arg.as_str() {
            "--" => after_dashdash = true,
            "-v" => show_version = true,
            "-l" => list_bytecode = true,
            "-e" => {
                i += 1;
                match args.get(i) {
                    Some(stat) => exec_chunks.push(stat.clone()),
                    None => {
                        eprintln!("lunara: '-e' needs argument");
                        eprintln!("{USAGE}");
                        return ExitCode::FAILURE;
                    }
                }
            }
            "-o" => {
                i += 1;
                match args.get(i) {
                    Some(path) => dump_to = Some(path.clone()),
                    None => {
                        eprintln!("lunara: '-o' needs argument");
                        eprintln!("{USAGE}");
                        return ExitCode::FAILURE;
                    }
                }
            }
            _ if arg.starts_with("-e") && arg.len() > 2 => {
                exec_chunks.push(arg[2..].to_string());
            }
            _ if arg.starts_with('-') && arg != "-" => {
                eprintln!("lunara: unrecognized option '{arg}'");
                eprintln!("{USAGE}");
                return ExitCode::FAILURE;
            }
            _ => {
                script = Some(arg.clone());
                break;
            }
        }
        i += 1;
    }

    if show_version {
        println!("{VERSION}");
        if script.is_none() && exec_chunks.is_empty() {
            return ExitCode::SUCCESS;
        }
    }

    if script.is_none() && exec_chunks.is_empty() {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    }

    let mut vm = Vm::new();
    stdlib::install(&mut vm);

    for stat in &exec_chunks {
        if let Err(code) = run_chunk(&mut vm, stat.as_bytes(), "=(command line)", false, &None) {
            return code;
        }
    }

    if let Some(path) = script {
        let (data, name) = if path == "-" {
            let mut buf = Vec::new();
            if let Err(e) = std::io::stdin().read_to_end(&mut buf) {
                eprintln!("lunara: cannot read stdin: {e}");
                return ExitCode::FAILURE;
            }
            (buf, "=stdin".to_string())
        } else {
            match std::fs::read(&path) {
                Ok(data) => (data, format!("@{path}")),
                Err(e) => {
                    eprintln!("lunara: cannot open {path}: {e}");
                    return ExitCode::FAILURE;
                }
            }
        };
        if let Err(code) = run_chunk(&mut vm, &data, &name, list_bytecode, &dump_to) {
            return code;
        }
    }

    ExitCode::SUCCESS
}

/// Compile (or undump) a chunk, then list, dump, or run it.
fn run_chunk(
    vm: &mut Vm,
    data: &[u8],
    name: &str,
    list: bool,
    dump_to: &Option<String>,
) -> Result<(), ExitCode> {
    if list || dump_to.is_some() {
        let proto = if data.starts_with(b"\x1bLua") {
            let mut strings = std::mem::take(&mut vm.strings);
            let result = binary_chunk::undump(data, name, &mut strings);
            vm.strings = strings;
            result.map_err(|e| {
                eprintln!("lunara: {e}");
                ExitCode::FAILURE
            })?
        } else {
            let mut strings = std::mem::take(&mut vm.strings);
            let result = lunara_compiler::compile(data, name, &mut strings);
            vm.strings = strings;
            result.map_err(|e| {
                eprintln!("lunara: {name}:{e}");
                ExitCode::FAILURE
            })?
        };
        if list {
            print!("{}", lunara_compiler::disasm::disassemble(&proto, &vm.strings));
        }
        if let Some(path) = dump_to {
            let blob = binary_chunk::dump(&proto, &vm.strings);
            if let Err(e) = std::fs::write(path, blob) {
                eprintln!("lunara: cannot write {path}: {e}");
                return Err(ExitCode::FAILURE);
            }
        }
        return Ok(());
    }

    if let Err(e) = vm.load(data, name) {
        eprintln!("lunara: {e}");
        return Err(ExitCode::FAILURE);
    }
    if let Err(e) = vm.call(0, 0) {
        eprintln!("lunara: {e}");
        return Err(ExitCode::FAILURE);
    }
    Ok(())
}
