//! Opérations sur l'arbre YAML de configuration
//!
//! Toutes les clés de mapping sont normalisées en minuscules, aussi bien à
//! la lecture qu'à l'écriture.

use anyhow::{bail, Result};
use serde_yaml::{Mapping, Value};

fn key(name: &str) -> Value {
    Value::String(name.to_lowercase())
}

/// Cherche `path` dans `root`, erreur dès qu'un segment manque
pub(crate) fn lookup<'a>(root: &'a Value, path: &[&str]) -> Result<&'a Value> {
    let mut node = root;
    for (depth, name) in path.iter().enumerate() {
        let Value::Mapping(map) = node else {
            bail!("{} is a leaf, cannot descend", path[..depth].join("."));
        };
        match map.get(key(name)) {
            Some(child) => node = child,
            None => bail!("Path {} does not exist", path[..=depth].join(".")),
        }
    }
    Ok(node)
}

/// Place `value` à `path` en créant les mappings intermédiaires
pub(crate) fn insert(root: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut node = root;
    for name in parents {
        let Value::Mapping(map) = node else {
            bail!("Cannot set {}: {name} is below a leaf", path.join("."));
        };
        node = map
            .entry(key(name))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
    }
    match node {
        Value::Mapping(map) => {
            map.insert(key(last), value);
            Ok(())
        }
        _ => bail!("Cannot set {}: parent is a leaf", path.join(".")),
    }
}

/// Fusionne `overlay` dans `base`
///
/// Les mappings sont fusionnés clé par clé, tout autre nœud de `overlay`
/// remplace celui de `base`.
pub(crate) fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (k, v) in overlay_map {
                match base_map.get_mut(&k) {
                    Some(existing) => merge(existing, v),
                    None => {
                        base_map.insert(k, v);
                    }
                }
            }
        }
        (slot, v) => *slot = v,
    }
}

/// Passe récursivement toutes les clés en minuscules
pub(crate) fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (k, normalize_keys(v))
                })
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

/// Applique les variables `PREFIX` + `A__B__C=valeur` sur l'arbre
///
/// Les valeurs sont lues comme des scalaires YAML : `8081` devient un
/// nombre, `true` un booléen. Une variable visant un chemin impossible est
/// ignorée.
pub(crate) fn apply_env<I>(root: &mut Value, prefix: &str, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (name, raw) in vars {
        let Some(rest) = name.strip_prefix(prefix) else {
            continue;
        };
        let path: Vec<&str> = rest.split("__").filter(|s| !s.is_empty()).collect();
        if path.is_empty() {
            continue;
        }
        let value = serde_yaml::from_str(&raw).unwrap_or(Value::String(raw.clone()));
        if let Err(err) = insert(root, &path, value) {
            tracing::warn!(variable = %name, "Ignoring configuration override: {err}");
        }
    }
}
