fn main() -> std::process::ExitCode {
    voicecmd_lib::run()
}
