//! Dependency references.
//!
//! A `DependencyRef` ties a provider authored in this package to a dependency
//! it requires. Each one becomes registry rows below the provider's key that
//! the installer's dependency checks read.

use crate::binder::{
    data::{Section, Symbol, SymbolKind},
    utils::checksum::generate_identifier,
};
use std::borrow::Cow;

const DEPENDENCY_REGISTRY_ROOT: &str = r"Software\Classes\Installer\Dependencies\";
const REGISTRY_DEPENDENCIES: &str = "Dependencies";
/// `HKMU`: per-machine or per-user depending on the installation.
const MACHINE_OR_USER_ROOT: i64 = -1;

/// Adds the registry symbols for every dependency reference.
///
/// References whose provider or dependency is not in the section are skipped.
pub fn process_dependency_references(section: &mut Section) {
    let mut registry = Vec::new();

    for reference in section.symbols_of(&SymbolKind::DependencyRef) {
        let (Some(provider_id), Some(dependency_id)) = (
            reference.text("DependencyProvider_"),
            reference.text("Dependency_"),
        ) else {
            continue;
        };
        let provider = section.find(&SymbolKind::DependencyProvider, &provider_id);
        let dependency = section.find(&SymbolKind::Dependency, &dependency_id);
        let (Some(provider), Some(dependency)) = (provider, dependency) else {
            log::debug!("Skipping dependency reference {provider_id} -> {dependency_id}");
            continue;
        };
        let (Some(provides), Some(requires), Some(component)) = (
            provider.text("ProviderKey"),
            dependency.text("ProviderKey"),
            provider.text("Component_"),
        ) else {
            continue;
        };

        let key = format!("{DEPENDENCY_REGISTRY_ROOT}{provides}\\{REGISTRY_DEPENDENCIES}\\{requires}");
        let row = |name: &str, value: Option<Cow<'_, str>>| {
            let id = generate_identifier("reg", &[&provider_id, &dependency_id, name]);
            let mut symbol = Symbol::new(SymbolKind::Registry, id)
                .with("Root", MACHINE_OR_USER_ROOT)
                .with("Key", key.as_str())
                .with("Name", if name == "(Default)" { "*" } else { name })
                .with("Component_", component.as_ref());
            if let Some(value) = value {
                symbol = symbol.with("Value", value.as_ref());
            }
            symbol.source = reference.source.clone();
            symbol
        };

        registry.push(row("(Default)", None));
        for version in ["MinVersion", "MaxVersion"] {
            if let Some(value) = dependency.text(version) {
                registry.push(row(version, Some(value)));
            }
        }
        if let Some(attributes) = dependency.int("Attributes").filter(|a| *a != 0) {
            registry.push(row("Attributes", Some(Cow::Owned(format!("#{attributes}")))));
        }
    }

    for symbol in registry {
        section.add(symbol);
    }
}
