fn main() -> anyhow::Result<()> {
    kvgen::cmdline()
}
