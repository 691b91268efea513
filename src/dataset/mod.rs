//! Cleaned SRAG dataset: typed case records, CSV loading and location filtering.
//!
//! The cleaned file is `;`-delimited UTF-8 with one row per notified case.
//! Categorical columns hold decoded labels; every label is mapped onto a
//! closed enum and an unknown label is reported instead of silently dropped.

pub mod age;
pub mod categories;
pub mod location;

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use age::normalize_age;
pub use categories::{
    Categorical, Classification, Outcome, Pregnancy, Race, Sex, VentilatorySupport, YesNo,
};
pub use location::{is_national, resolve_state_code, LocationFilter};

pub const DELIMITER: u8 = b';';
pub const CLASSIFICATION_COLUMN: &str = "classificacao_final";

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open dataset {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unrecognized value '{value}' in column '{column}' (line {line})")]
    UnrecognizedLabel {
        column: &'static str,
        line: u64,
        value: String,
    },
}

/// One row of the cleaned dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseRecord {
    pub notification_date: Option<NaiveDate>,
    pub first_symptom_date: Option<NaiveDate>,
    pub state_code: Option<String>,
    pub municipality: Option<String>,
    pub sex: Option<Sex>,
    /// Corrected age in years.
    pub age_years: Option<f64>,
    pub race: Option<Race>,
    pub pregnancy: Option<Pregnancy>,
    pub hospitalized: Option<YesNo>,
    pub icu: Option<YesNo>,
    pub icu_admission_date: Option<NaiveDate>,
    pub ventilatory_support: Option<VentilatorySupport>,
    pub classification: Option<Classification>,
    pub outcome: Option<Outcome>,
    pub covid_vaccinated: Option<YesNo>,
    pub flu_vaccinated: Option<YesNo>,
}

impl CaseRecord {
    pub fn is_hospitalized(&self) -> bool {
        self.hospitalized == Some(YesNo::Yes)
    }

    pub fn is_icu(&self) -> bool {
        self.icu == Some(YesNo::Yes)
    }

    pub fn resolved_outcome(&self) -> Option<Outcome> {
        self.outcome.filter(Outcome::is_resolved)
    }
}

/// Raw row as written by the cleaning step. Absent columns read as `None`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCaseRow {
    data_notificacao: Option<String>,
    data_primeiros_sintomas: Option<String>,
    uf_notificacao: Option<String>,
    municipio_notificacao: Option<String>,
    sexo: Option<String>,
    idade: Option<String>,
    tipo_idade: Option<String>,
    idade_anos_corrigida: Option<String>,
    raca: Option<String>,
    gestante: Option<String>,
    foi_internado: Option<String>,
    internado_uti: Option<String>,
    data_entrada_uti: Option<String>,
    suporte_ventilatorio: Option<String>,
    classificacao_final: Option<String>,
    evolucao_caso: Option<String>,
    vacinado_covid: Option<String>,
    vacinado_gripe: Option<String>,
}

impl RawCaseRow {
    fn into_record(self, line: u64) -> Result<CaseRecord, DatasetError> {
        let age_years = match parse_number(self.idade_anos_corrigida.as_deref()) {
            Some(age) => Some(age),
            None => normalize_age(
                parse_number(self.idade.as_deref()),
                parse_number(self.tipo_idade.as_deref()).map(|u| u as i64),
            ),
        };

        Ok(CaseRecord {
            notification_date: parse_date(self.data_notificacao.as_deref()),
            first_symptom_date: parse_date(self.data_primeiros_sintomas.as_deref()),
            state_code: non_missing(self.uf_notificacao),
            municipality: non_missing(self.municipio_notificacao),
            sex: decode("sexo", line, self.sexo)?,
            age_years,
            race: decode("raca", line, self.raca)?,
            pregnancy: decode("gestante", line, self.gestante)?,
            hospitalized: decode("foi_internado", line, self.foi_internado)?,
            icu: decode("internado_uti", line, self.internado_uti)?,
            icu_admission_date: parse_date(self.data_entrada_uti.as_deref()),
            ventilatory_support: decode("suporte_ventilatorio", line, self.suporte_ventilatorio)?,
            classification: decode(CLASSIFICATION_COLUMN, line, self.classificacao_final)?,
            outcome: decode("evolucao_caso", line, self.evolucao_caso)?,
            covid_vaccinated: decode("vacinado_covid", line, self.vacinado_covid)?,
            flu_vaccinated: decode("vacinado_gripe", line, self.vacinado_gripe)?,
        })
    }
}

fn non_missing(value: Option<String>) -> Option<String> {
    value
        .filter(|v| !categories::is_missing_label(v))
        .map(|v| v.trim().to_string())
}

fn decode<T: Categorical>(
    column: &'static str,
    line: u64,
    value: Option<String>,
) -> Result<Option<T>, DatasetError> {
    match value {
        None => Ok(None),
        Some(v) if categories::is_missing_label(&v) => Ok(None),
        Some(v) => T::from_label(&v)
            .or_else(|| T::from_code(&v))
            .map(Some)
            .ok_or(DatasetError::UnrecognizedLabel { column, line, value: v }),
    }
}

fn parse_number(value: Option<&str>) -> Option<f64> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Accepts ISO dates, ISO date-times and the Brazilian `dd/mm/yyyy` form.
/// Anything else is treated as missing.
pub fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .ok()
}

/// Immutable, fully-constructed view over case records.
///
/// Cloning is cheap; the records are shared.
#[derive(Debug, Clone)]
pub struct DatasetView {
    records: Arc<[CaseRecord]>,
    has_classification: bool,
}

impl Default for DatasetView {
    fn default() -> Self {
        Self::from_records(Vec::new(), true)
    }
}

impl DatasetView {
    pub fn from_records(records: Vec<CaseRecord>, has_classification: bool) -> Self {
        Self {
            records: records.into(),
            has_classification,
        }
    }

    /// Load the whole cleaned dataset from disk.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let file = std::fs::File::open(path).map_err(|source| DatasetError::Open {
            path: path.display().to_string(),
            source,
        })?;
        let view = Self::from_reader(file)?;
        info!(path = %path.display(), records = view.len(), "Dataset loaded");
        Ok(view)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(true)
            .from_reader(reader);

        let headers: StringRecord = rdr.headers()?.clone();
        let has_classification = headers.iter().any(|h| h == CLASSIFICATION_COLUMN);
        if !has_classification {
            debug!("Dataset has no classification column");
        }

        let mut records = Vec::new();
        for row in rdr.records() {
            let row = row?;
            let line = row.position().map(|p| p.line()).unwrap_or_default();
            let raw: RawCaseRow = row.deserialize(Some(&headers))?;
            records.push(raw.into_record(line)?);
        }

        Ok(Self::from_records(records, has_classification))
    }

    /// Narrow the view to a location. The source view is untouched.
    pub fn filter(&self, filter: &LocationFilter) -> Self {
        let records: Vec<CaseRecord> = self
            .records
            .iter()
            .filter(|r| filter.matches(r.state_code.as_deref(), r.municipality.as_deref()))
            .cloned()
            .collect();

        if records.is_empty() {
            warn!(
                state = ?filter.state_code,
                city = ?filter.city,
                "No records for the requested location"
            );
        } else {
            info!(
                state = ?filter.state_code,
                city = ?filter.city,
                records = records.len(),
                "Dataset filtered"
            );
        }

        Self::from_records(records, self.has_classification)
    }

    pub fn records(&self) -> &[CaseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_classification(&self) -> bool {
        self.has_classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "data_notificacao;data_primeiros_sintomas;uf_notificacao;municipio_notificacao;sexo;idade;tipo_idade;idade_anos_corrigida;foi_internado;internado_uti;suporte_ventilatorio;classificacao_final;evolucao_caso;vacinado_covid";

    fn csv_with(rows: &[&str]) -> String {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15);
        assert_eq!(parse_date(Some("2024-03-15")), expected);
        assert_eq!(parse_date(Some("2024-03-15 00:00:00")), expected);
        assert_eq!(parse_date(Some("15/03/2024")), expected);
        assert_eq!(parse_date(Some("")), None);
        assert_eq!(parse_date(Some("not a date")), None);
        assert_eq!(parse_date(None), None);
    }

    #[test]
    fn test_load_decodes_rows() {
        let text = csv_with(&[
            "2024-03-15;2024-03-10;SC;Florianópolis;Feminino;45;3;45.0;Sim;Sim;Sim, invasivo;SRAG por COVID-19;Óbito;Não",
            "2024-03-16;;SC;Joinville;Não Informado;;;;Não;Não Informado;;SRAG por Influenza;Cura;Sim",
        ]);
        let view = DatasetView::from_reader(text.as_bytes()).unwrap();
        assert_eq!(view.len(), 2);
        assert!(view.has_classification());

        let first = &view.records()[0];
        assert_eq!(first.state_code.as_deref(), Some("SC"));
        assert_eq!(first.sex, Some(Sex::Female));
        assert_eq!(first.age_years, Some(45.0));
        assert!(first.is_icu());
        assert_eq!(first.ventilatory_support, Some(VentilatorySupport::Invasive));
        assert_eq!(first.outcome, Some(Outcome::Death));

        let second = &view.records()[1];
        assert_eq!(second.first_symptom_date, None);
        assert_eq!(second.sex, None);
        assert_eq!(second.icu, None);
        assert_eq!(second.age_years, None);
        assert_eq!(second.covid_vaccinated, Some(YesNo::Yes));
    }

    #[test]
    fn test_age_is_normalized_when_corrected_column_is_empty() {
        let text = csv_with(&["2024-03-15;;SP;;;730;1;;;;;;;"]);
        let view = DatasetView::from_reader(text.as_bytes()).unwrap();
        let age = view.records()[0].age_years.unwrap();
        assert!((age - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_raw_codes_decode_like_labels() {
        let text = "data_notificacao;uf_notificacao;evolucao_caso;internado_uti;sexo\n\
            2024-03-15;SP;2;1;F\n\
            2024-03-16;SP;Cura;2;M";
        let view = DatasetView::from_reader(text.as_bytes()).unwrap();

        let first = &view.records()[0];
        assert_eq!(first.outcome, Some(Outcome::Death));
        assert!(first.is_icu());
        assert_eq!(first.sex, Some(Sex::Female));

        let second = &view.records()[1];
        assert_eq!(second.outcome, Some(Outcome::Cure));
        assert_eq!(second.icu, Some(YesNo::No));
        assert_eq!(second.sex, Some(Sex::Male));
    }

    #[test]
    fn test_unknown_code_is_still_an_error() {
        let text = "data_notificacao;evolucao_caso\n2024-03-15;7";
        let err = DatasetView::from_reader(text.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::UnrecognizedLabel { column: "evolucao_caso", .. }
        ));
    }

    #[test]
    fn test_unrecognized_label_is_an_error() {
        let text = csv_with(&["2024-03-15;;SP;;;;;;;;;;Talvez;"]);
        let err = DatasetView::from_reader(text.as_bytes()).unwrap_err();
        match err {
            DatasetError::UnrecognizedLabel { column, value, .. } => {
                assert_eq!(column, "evolucao_caso");
                assert_eq!(value, "Talvez");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_classification_column_is_detected() {
        let text = "data_notificacao;uf_notificacao\n2024-01-01;SP";
        let view = DatasetView::from_reader(text.as_bytes()).unwrap();
        assert_eq!(view.len(), 1);
        assert!(!view.has_classification());
    }

    #[test]
    fn test_filter_by_state_and_city() {
        let text = csv_with(&[
            "2024-03-15;;SC;Florianópolis;;;;;;;;;;",
            "2024-03-15;;SC;FLORIANOPOLIS;;;;;;;;;;",
            "2024-03-15;;SC;Joinville;;;;;;;;;;",
            "2024-03-15;;SP;São Paulo;;;;;;;;;;",
        ]);
        let view = DatasetView::from_reader(text.as_bytes()).unwrap();

        let state = view.filter(&LocationFilter::resolve("Santa Catarina", None));
        assert_eq!(state.len(), 3);

        let city = view.filter(&LocationFilter::resolve("SC", Some("florianopolis")));
        assert_eq!(city.len(), 2);

        let national = view.filter(&LocationFilter::resolve("BR", None));
        assert_eq!(national.len(), 4);

        let nowhere = view.filter(&LocationFilter::resolve("Atlantis", None));
        assert!(nowhere.is_empty());
        assert_eq!(view.len(), 4);
    }
}
