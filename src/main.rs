fn main() -> std::process::ExitCode {
    prdgen_lib::run()
}
