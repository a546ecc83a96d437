//! Prints the CRDs owned by the controller as a multi-document YAML stream.
//!
//! Usage: `cargo run -p crds --bin crdgen > deploy/crds.yaml`

use crds::{OperatingSystemConfig, OperatingSystemProfile};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [OperatingSystemProfile::crd(), OperatingSystemConfig::crd()];
    for crd in crds {
        println!("---");
        print!("{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
