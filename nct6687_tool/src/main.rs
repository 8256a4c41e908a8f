use nct6687_lib::commandline;

fn get_args() -> Vec<String> {
    std::env::args().collect()
}

fn main() {
    let args = commandline::parse(&get_args());
    let code = commandline::run_with_args(&args);
    std::process::exit(code)
}
