use anyhow::Result;

fn main() -> Result<()> {
    mobshell::run()
}
