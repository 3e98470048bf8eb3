use conjure::cli;

fn main() -> anyhow::Result<()> {
    if let Err(e) = cli::run() {
        let msg = e.to_string();
        // Materialization failures have already been rendered as diagnostics.
        if msg.contains("lexing failed")
            || msg.contains("parsing failed")
            || msg.contains("check failed")
        {
            std::process::exit(1);
        }
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use conjure::cli::{Command, ConjureCli};

    #[test]
    fn run_command_reads_stub_and_arguments() {
        let cli = ConjureCli::parse_from([
            "conjure",
            "run",
            "stubs.yaml",
            "--stub",
            "add",
            "--args",
            "[1, 2]",
            "--retry-limit",
            "5",
        ]);
        match cli.command() {
            Command::Run {
                manifest,
                stub,
                args,
                kwargs,
            } => {
                assert_eq!(manifest.to_string_lossy(), "stubs.yaml");
                assert_eq!(stub, "add");
                assert_eq!(args.as_deref(), Some("[1, 2]"));
                assert!(kwargs.is_none());
            }
            other => panic!("expected run command, got {other:?}"),
        }
    }

    #[test]
    fn check_command_takes_a_body_file() {
        let cli = ConjureCli::parse_from(["conjure", "check", "m.yaml", "--stub", "f", "body.py"]);
        match cli.command() {
            Command::Check { body, .. } => assert_eq!(body.to_string_lossy(), "body.py"),
            other => panic!("expected check command, got {other:?}"),
        }
    }
}
