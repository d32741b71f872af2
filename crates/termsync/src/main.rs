//! CLI entrypoint for termsync.

use termsync::Application;

fn main() {
    let app = Application::new();
    let exit_code = app.run();
    std::process::exit(exit_code);
}
