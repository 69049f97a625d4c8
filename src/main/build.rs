fn main() {
    // Settings are baked in at compile time from cfg.toml, see cfg.toml.example
    println!("cargo:rerun-if-changed=cfg.toml");
}
