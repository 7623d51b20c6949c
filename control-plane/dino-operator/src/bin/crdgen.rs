use dino_operator::scheme::dino_scheme;

/// Prints every registered CRD as a multi-document YAML stream.
fn main() -> anyhow::Result<()> {
    for kind in dino_scheme().kinds() {
        println!("---");
        print!("{}", serde_yaml::to_string(&kind.crd)?);
    }
    Ok(())
}
