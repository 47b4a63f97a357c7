use anyhow::Context;

fn main() -> anyhow::Result<()> {
    scdkit::run().context("scdkit failed")?;
    Ok(())
}
