use modlisp::Interpreter;
use modlisp::builtinops::Arity;
use modlisp::environment::Environment;
use modlisp::loader::FsLoader;
use modlisp::value::Value;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::process;

fn main() {
    env_logger::init();

    if let Err(err) = run_repl() {
        eprintln!("The REPL encountered an unexpected error and must exit.");
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run_repl() -> Result<(), ReadlineError> {
    println!("modlisp - a small Lisp with modules");
    println!("Enter expressions like: (cons 1 (list 2 3))");
    println!("Files for load/require are read from the current directory.");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;
    let mut interp = Interpreter::with_loader(FsLoader::new("."));

    // Callable from user code as (help)
    interp.register_builtin_function("help", Arity::Exact(0), |_args| {
        print_help();
        Ok(Value::Unspecified)
    });

    loop {
        match rl.readline("modlisp> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(interp.environment());
                        continue;
                    }
                    ":modules" => {
                        let names = interp.context().registry().module_names();
                        if names.is_empty() {
                            println!("No modules registered.");
                        } else {
                            println!("Modules: {}", names.join(", "));
                        }
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                match interp.eval_str(line) {
                    // Don't print Unspecified values (e.g., from define)
                    Ok(Value::Unspecified) => {}
                    Ok(result) => println!("{result}"),
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :modules   - List registered modules");
    println!("  :quit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("Lists: list, cons, first, rest, empty?, length, 'quoted");
    println!("Arithmetic and comparison: + - * / = < > <= >=");
    println!("Logic: and, or, not (booleans only)");
    println!("Forms: define, lambda, let, if, begin, quote");
    println!("Modules:");
    println!("  (module name (export a b) body...)");
    println!("  (import name)");
    println!("  (load \"file.lisp\")");
    println!("  (require \"file.lisp\")  (require \"file.lisp\" :as m)  (require \"file.lisp\" :only (a))");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    let (builtins, user_defined): (Vec<_>, Vec<_>) = bindings
        .into_iter()
        .partition(|(_, value)| matches!(value, Value::BuiltinFunction { .. }));

    if !builtins.is_empty() {
        println!("Built-in functions ({}):", builtins.len());
        for row in builtins.chunks(4) {
            for (name, _) in row {
                print!("  {name:<15}");
            }
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
