use serde::{Deserialize, Serialize};

/// Mode de journalisation utilisé par le système
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogMode {
    /// Sortie standard via env_logger
    #[default]
    File,
    /// Journal via systemd-journal
    SystemdJournal,
}

/// Initialise le logger selon le mode configuré
pub fn init_logging(log_mode: LogMode, log_level: &str) {
    match log_mode {
        LogMode::File => {
            env_logger::init_from_env(env_logger::Env::default().default_filter_or(log_level));
        }
        LogMode::SystemdJournal => {
            // Initialiser le logger systemd-journal uniquement si la feature est activée
            #[cfg(feature = "systemd")]
            {
                use systemd_journal_logger::JournalLog;

                let level = log_level
                    .parse::<log::LevelFilter>()
                    .unwrap_or(log::LevelFilter::Info);

                match JournalLog::new() {
                    Ok(logger) => {
                        if let Err(e) = logger
                            .with_syslog_identifier("aegis-ids".to_string())
                            .install()
                        {
                            eprintln!("Erreur lors de l'installation du logger systemd: {}", e);
                            env_logger::init_from_env(
                                env_logger::Env::default().default_filter_or(log_level),
                            );
                        } else {
                            log::set_max_level(level);
                        }
                    }
                    Err(e) => {
                        eprintln!("Erreur lors de l'initialisation du logger systemd: {}", e);
                        env_logger::init_from_env(env_logger::Env::default().default_filter_or(log_level));
                    }
                }
            }

            // Fallback si la feature systemd n'est pas activée
            #[cfg(not(feature = "systemd"))]
            {
                eprintln!("AVERTISSEMENT: Le mode SystemdJournal n'est pas disponible (feature 'systemd' non activée). Utilisation du logger standard à la place.");
                env_logger::init_from_env(env_logger::Env::default().default_filter_or(log_level));
            }
        }
    }
}
