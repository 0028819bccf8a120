/*

 ▄▄▄▄    ██▓    ▄▄▄       ▄████▄   ██ ▄█▀ ██▀███   █    ██   ██████  ██░ ██
▓█████▄ ▓██▒   ▒████▄    ▒██▀ ▀█   ██▄█▒ ▓██ ▒ ██▒ ██  ▓██▒▒██    ▒ ▓██░ ██▒
▒██▒ ▄██▒██░   ▒██  ▀█▄  ▒▓█    ▄ ▓███▄░ ▓██ ░▄█ ▒▓██  ▒██░░ ▓██▄   ▒██▀▀██░
▒██░█▀  ▒██░   ░██▄▄▄▄██ ▒▓▓▄ ▄██▒▓██ █▄ ▒██▀▀█▄  ▓▓█  ░██░  ▒   ██▒░▓█ ░██
░▓█  ▀█▓░██████▒▓█   ▓██▒▒ ▓███▀ ░▒██▒ █▄░██▓ ▒██▒▒▒█████▓ ▒██████▒▒░▓█▒░██▓
░▒▓███▀▒░ ▒░▓  ░▒▒   ▓▒█░░ ░▒ ▒  ░▒ ▒▒ ▓▒░ ▒▓ ░▒▓░░▒▓▒ ▒ ▒ ▒ ▒▓▒ ▒ ░ ▒ ░░▒░▒
▒░▒   ░ ░ ░ ▒  ░ ▒   ▒▒ ░  ░  ▒   ░ ░▒ ▒░  ░▒ ░ ▒░░░▒░ ░ ░ ░ ░▒  ░ ░ ▒ ░▒░ ░
 ░    ░   ░ ░    ░   ▒   ░        ░ ░░ ░   ░░   ░  ░░░ ░ ░ ░  ░  ░   ░  ░░ ░
 ░          ░  ░     ░  ░░ ░      ░  ░      ░        ░           ░   ░  ░  ░
      ░                  ░
Copyright (C) 2026, Blackrush LLC, All Rights Reserved
Created by Erik Olson, Tarpon Springs, Florida
For more information, visit BlackrushDrive.com

MIT License

Copyright (c) 2026 Erik Lee Olson for Blackrush, LLC

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.

*/

use std::env;
use std::process;

use objectir_ir::Value;
use objectir_vm::Vm;
use tracing_subscriber::EnvFilter;

fn print_usage(program: &str) {
    eprintln!("Usage: {} <module_file> [entry_point] [args...]", program);
    eprintln!("  module_file: Path to .ir (text) or .json ObjectIR module");
    eprintln!("  entry_point: Optional Class.Method entry point (default: Main.Main)");
    eprintln!("  args: Optional arguments to pass to the entry point");
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .compact()
        .without_time()
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }

    let module_path = &args[1];
    let entry_point = args.get(2).cloned().unwrap_or_else(|| "Main.Main".to_string());
    let program_args: Vec<String> = args.iter().skip(3).cloned().collect();

    let Some(dot) = entry_point.rfind('.') else {
        eprintln!("Invalid entry point format. Expected: Class.Method or Namespace.Class.Method");
        process::exit(1);
    };
    let mut class_name = entry_point[..dot].to_string();
    let mut method_name = entry_point[dot + 1..].to_string();

    let module = match objectir_loader::load_from_file(module_path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error[{}]: {}", e.kind, e.message);
            process::exit(1);
        }
    };

    let mut vm = Vm::new();
    vm.load_module(module);

    // The default entry falls back to Program.Main by convention.
    if entry_point == "Main.Main" && !vm.classes().has(&class_name) && vm.classes().has("Program") {
        class_name = "Program".to_string();
        method_name = "Main".to_string();
    }

    match vm.run_entry(&class_name, &method_name, &program_args) {
        Ok(result) => match result {
            Value::Null => {}
            Value::Object(_) => println!("Result: [Object]"),
            other => println!("Result: {}", other),
        },
        Err(e) => {
            eprintln!("error[{}]: {}", e.kind, e.message);
            process::exit(1);
        }
    }
}
