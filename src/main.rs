fn main() -> anyhow::Result<()> {
    loadpulses::cli::run::entry()
}
