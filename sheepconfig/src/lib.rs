//! # Module de configuration de SheepStream
//!
//! Configuration YAML partagée par toutes les crates de SheepStream.
//!
//! L'arbre est construit en trois couches :
//! - la configuration par défaut, embarquée dans le binaire (`sheepstream.yaml`)
//! - le fichier `config.yaml` du répertoire de configuration, fusionné par dessus
//! - les variables d'environnement `SHEEPSTREAM_CONFIG__A__B=valeur`
//!
//! Les crates fonctionnelles (`electricsheep`, `sheepplayer`) ajoutent leurs
//! accesseurs typés via des traits d'extension implémentés sur [`Config`].
//!
//! ## Utilisation
//!
//! ```no_run
//! use sheepconfig::get_config;
//!
//! let config = get_config();
//! let level = config.get_log_min_level()?;
//! let sheep_dir = config.get_managed_dir(&["sheep", "directory"], "sheep")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

mod tree;

use anyhow::{anyhow, Context, Result};
use lazy_static::lazy_static;
use serde_yaml::Value;
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{debug, info};

const DEFAULT_CONFIG: &str = include_str!("sheepstream.yaml");

const ENV_CONFIG_DIR: &str = "SHEEPSTREAM_CONFIG";
const ENV_PREFIX: &str = "SHEEPSTREAM_CONFIG__";
const CONFIG_DIR_NAME: &str = ".sheepstream";
const CONFIG_FILE_NAME: &str = "config.yaml";

const LOG_MIN_LEVEL: &[&str] = &["host", "logger", "min_level"];
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load SheepStream configuration"));
}

/// Configuration globale du processus, chargée au premier accès
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Arbre de configuration fusionné, sauvegardé dans `config.yaml` à chaque modification
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    file: PathBuf,
    data: Mutex<Value>,
}

impl Config {
    /// Charge la configuration depuis `directory`
    ///
    /// Si `directory` est vide, le répertoire est cherché dans l'ordre :
    /// variable `SHEEPSTREAM_CONFIG`, `./.sheepstream`, puis
    /// `~/.sheepstream` ; à défaut `./.sheepstream` est utilisé.
    /// Le répertoire est créé si besoin et doit être accessible en écriture.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = locate_config_dir(directory);
        check_writable(Path::new(&config_dir))
            .with_context(|| format!("Unusable config directory {config_dir}"))?;
        info!(config_dir = %config_dir, "Using config directory");

        let file = Path::new(&config_dir).join(CONFIG_FILE_NAME);
        let mut data: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        match fs::read_to_string(&file) {
            Ok(text) => {
                let user: Value = serde_yaml::from_str(&text)
                    .with_context(|| format!("Invalid YAML in {}", file.display()))?;
                tree::merge(&mut data, user);
                info!(config_file = %file.display(), "Loaded config file");
            }
            Err(_) => info!(config_file = %file.display(), "No config file, using defaults"),
        }

        let mut data = tree::normalize_keys(data);
        tree::apply_env(&mut data, ENV_PREFIX, env::vars());

        let config = Self {
            config_dir,
            file,
            data: Mutex::new(data),
        };
        config.save()?;
        Ok(config)
    }

    /// Répertoire contenant `config.yaml`, base des répertoires gérés relatifs
    pub fn config_dir(&self) -> &str {
        &self.config_dir
    }

    fn data(&self) -> MutexGuard<'_, Value> {
        // un panic pendant une écriture ne laisse jamais l'arbre à moitié modifié
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Écrit l'arbre courant dans `config.yaml`
    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(&*self.data())?;
        fs::write(&self.file, yaml)
            .with_context(|| format!("Cannot write {}", self.file.display()))
    }

    /// Copie du nœud situé à `path`, erreur s'il est absent
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        tree::lookup(&self.data(), path).cloned()
    }

    /// Modifie le nœud situé à `path` (clés insensibles à la casse) et sauvegarde
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        tree::insert(&mut self.data(), path, value)?;
        self.save()
    }

    /// Lit un entier non signé, `default` si absent ou mal formé
    pub fn get_u64_or(&self, path: &[&str], default: u64) -> u64 {
        match self.get_value(path) {
            Ok(Value::Number(n)) => n.as_u64().unwrap_or(default),
            Ok(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Lit un flottant, `default` si absent ou mal formé
    pub fn get_f64_or(&self, path: &[&str], default: f64) -> f64 {
        match self.get_value(path) {
            Ok(Value::Number(n)) => n.as_f64().unwrap_or(default),
            Ok(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_bool_or(&self, path: &[&str], default: bool) -> bool {
        self.get_value(path)
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    pub fn get_string_or(&self, path: &[&str], default: &str) -> String {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => default.to_string(),
        }
    }

    /// Récupère un répertoire géré par la configuration
    ///
    /// Le chemin configuré peut être absolu ou relatif au répertoire de
    /// configuration. S'il est absent, `default` est enregistré. Le
    /// répertoire est créé s'il n'existe pas.
    pub fn get_managed_dir(&self, path: &[&str], default: &str) -> Result<String> {
        let configured = match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => {
                self.set_managed_dir(path, default.to_string())?;
                default.to_string()
            }
        };

        let dir = Path::new(&self.config_dir).join(&configured);
        if !dir.is_dir() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Cannot create {}", dir.display()))?;
            info!(directory = %dir.display(), "Created managed directory");
        }
        Ok(dir.to_string_lossy().into_owned())
    }

    /// Définit un répertoire géré par la configuration
    pub fn set_managed_dir(&self, path: &[&str], directory: String) -> Result<()> {
        self.set_value(path, Value::String(directory))
    }

    /// Niveau de log minimum (default: `INFO`)
    pub fn get_log_min_level(&self) -> Result<String> {
        Ok(self.get_string_or(LOG_MIN_LEVEL, DEFAULT_LOG_MIN_LEVEL))
    }

    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(LOG_MIN_LEVEL, Value::String(level))
    }
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            config_dir: self.config_dir.clone(),
            file: self.file.clone(),
            data: Mutex::new(self.data().clone()),
        }
    }
}

fn locate_config_dir(directory: &str) -> String {
    if !directory.is_empty() {
        return directory.to_string();
    }
    if let Ok(dir) = env::var(ENV_CONFIG_DIR) {
        debug!(env_var = ENV_CONFIG_DIR, path = %dir, "Config directory from environment");
        return dir;
    }
    let home = dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME));
    [Some(PathBuf::from(CONFIG_DIR_NAME)), home]
        .into_iter()
        .flatten()
        .find(|candidate| candidate.is_dir())
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_else(|| CONFIG_DIR_NAME.to_string())
}

fn check_writable(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    if !dir.is_dir() {
        return Err(anyhow!("{} is not a directory", dir.display()));
    }
    let probe = dir.join(".write_test");
    fs::write(&probe, b"sheep")?;
    fs::remove_file(&probe)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_in_tempdir() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_defaults_are_embedded() {
        let (dir, config) = load_in_tempdir();
        assert_eq!(config.get_u64_or(&["player", "vlc", "http_port"], 0), 8080);
        assert_eq!(config.get_log_min_level().unwrap(), "INFO");
        assert!(
            (config.get_f64_or(&["sheep", "sequence", "loop_chance"], 0.0) - 0.82).abs() < 1e-9
        );
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn test_set_value_survives_reload() {
        let (dir, config) = load_in_tempdir();
        config
            .set_value(&["Player", "VLC", "http_port"], Value::from(9090u64))
            .unwrap();

        let reloaded = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(reloaded.get_u64_or(&["player", "vlc", "http_port"], 0), 9090);
        assert_eq!(reloaded.get_string_or(&["player", "vlc", "binary"], ""), "vlc");
    }

    #[test]
    fn test_user_file_is_merged_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "Sheep:\n  Backoff:\n    max_secs: 60\n",
        )
        .unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(config.get_u64_or(&["sheep", "backoff", "max_secs"], 0), 60);
        assert_eq!(config.get_u64_or(&["sheep", "backoff", "initial_secs"], 0), 20);
    }

    #[test]
    fn test_missing_or_malformed_values_fall_back() {
        let (_dir, config) = load_in_tempdir();
        assert!(config.get_value(&["nope", "missing"]).is_err());
        assert_eq!(config.get_u64_or(&["nope"], 7), 7);
        assert!(config.get_bool_or(&["nope"], true));

        config
            .set_value(&["sheep", "feed", "timeout_secs"], Value::from("soon"))
            .unwrap();
        assert_eq!(config.get_u64_or(&["sheep", "feed", "timeout_secs"], 30), 30);
    }

    #[test]
    fn test_managed_dir_is_relative_to_config_dir() {
        let (dir, config) = load_in_tempdir();
        let managed = config.get_managed_dir(&["sheep", "directory"], "sheep").unwrap();
        assert_eq!(Path::new(&managed), dir.path().join("sheep"));
        assert!(Path::new(&managed).is_dir());
    }

    #[test]
    fn test_absolute_managed_dir_is_kept() {
        let (_dir, config) = load_in_tempdir();
        let elsewhere = tempfile::tempdir().unwrap();
        let target = elsewhere.path().join("flock");
        config
            .set_managed_dir(&["sheep", "directory"], target.to_string_lossy().into_owned())
            .unwrap();
        let managed = config.get_managed_dir(&["sheep", "directory"], "sheep").unwrap();
        assert_eq!(Path::new(&managed), target);
        assert!(target.is_dir());
    }
}
