//! `strata personas`: list personas and their allowlists.

use strata_security::PersonaRegistry;

pub fn run() {
    let registry = PersonaRegistry::builtin();
    println!("Personas");
    println!("========");
    for profile in registry.iter() {
        let tools: Vec<&str> = profile.allowed_tools.iter().map(|k| k.as_str()).collect();
        println!();
        println!("  {:<11} {} ({})", profile.key, profile.display_name, profile.role);
        println!("  {:<11} {}", "", tools.join(", "));
    }
}
