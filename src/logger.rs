use crate::models::AlertLogEntry;
use log::{error, info};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Journal d'alertes en ajout seul
///
/// Une ligne par alerte, écrite en un seul appel sous verrou: plusieurs
/// boucles de capture peuvent partager le même journal sans entrelacement.
pub struct AlertLogger {
    log_file: Mutex<Option<File>>,
    log_path: PathBuf,
}

impl AlertLogger {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        let log_path = log_path.into();
        let file = match Self::open(&log_path) {
            Ok(file) => Some(file),
            Err(e) => {
                error!("Erreur lors de l'ouverture du journal d'alertes {}: {}", log_path.display(), e);
                None
            }
        };

        Self {
            log_file: Mutex::new(file),
            log_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    fn open(path: &Path) -> io::Result<File> {
        // Créer le répertoire si nécessaire
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        OpenOptions::new().create(true).append(true).open(path)
    }

    /// Ajoute une entrée. En cas d'échec le fichier est rouvert pour l'appel suivant.
    pub fn append(&self, entry: &AlertLogEntry) -> io::Result<()> {
        let line = format!("{}\n", entry.to_line());

        let mut log_file_guard = self
            .log_file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "verrou du journal d'alertes empoisonné"))?;

        if log_file_guard.is_none() {
            *log_file_guard = Some(Self::open(&self.log_path)?);
            info!("Journal d'alertes {} rouvert", self.log_path.display());
        }

        let result = match log_file_guard.as_mut() {
            Some(file) => file.write_all(line.as_bytes()).and_then(|_| file.flush()),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "journal d'alertes indisponible")),
        };

        if result.is_err() {
            // Essayer de réouvrir le fichier au prochain appel
            *log_file_guard = Self::open(&self.log_path).ok();
        }

        result
    }
}

/// Relit les `count` dernières alertes valides d'un journal
pub fn read_recent_alerts(path: &Path, count: usize) -> io::Result<Vec<AlertLogEntry>> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();

    for line in reader.lines() {
        if let Some(entry) = AlertLogEntry::parse_line(&line?) {
            entries.push(entry);
        }
    }

    let skip = entries.len().saturating_sub(count);
    Ok(entries.split_off(skip))
}
