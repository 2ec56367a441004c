//! keygen — provision the overlay's RSA key pair as PKCS#1 PEM files.
//!
//! Runtime nodes never generate keys: the wind farm and ground station
//! refuse to start without their half of the pair.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use relay_node::config::{KeyPaths, DEFAULT_KEY_DIR};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

#[derive(Parser, Debug)]
#[command(name = "keygen", about = "Generate keys/public.pem and keys/private.pem")]
struct Args {
    /// Output directory
    #[arg(long, default_value = DEFAULT_KEY_DIR)]
    keys: PathBuf,
    /// Modulus size in bits
    #[arg(long, default_value_t = 2048)]
    bits: usize,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    std::fs::create_dir_all(&args.keys)
        .with_context(|| format!("creating {}", args.keys.display()))?;

    println!("Generating {}-bit RSA key pair...", args.bits);
    let private = RsaPrivateKey::new(&mut rand::thread_rng(), args.bits)?;
    let public = RsaPublicKey::from(&private);

    let paths = KeyPaths::in_dir(&args.keys);
    std::fs::write(&paths.private, private.to_pkcs1_pem(LineEnding::LF)?.as_bytes())
        .with_context(|| format!("writing {}", paths.private.display()))?;
    std::fs::write(&paths.public, public.to_pkcs1_pem(LineEnding::LF)?)
        .with_context(|| format!("writing {}", paths.public.display()))?;

    println!("Wrote {} and {}", paths.public.display(), paths.private.display());
    Ok(())
}
