use argo_lite::{cli, telemetry};

fn main() {
    let cli = cli::parse();
    telemetry::init(cli.verbose);

    if let Err(error) = cli::run(cli) {
        tracing::error!("fatal: {error}");
        eprintln!("argo-lite: {error}");
        std::process::exit(1);
    }
}
