fn main() -> anyhow::Result<()> {
    fogbench_cli::cli::execute()
}
