use serde::Serialize;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Municipality {
    pub name: &'static str,
    pub state: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    /// Multiplier applied to every estimate for this municipality.
    pub factor: f64,
}

const fn m(name: &'static str, state: &'static str, latitude: f64, longitude: f64, factor: f64) -> Municipality {
    Municipality {
        name,
        state,
        latitude,
        longitude,
        factor,
    }
}

pub const DEFAULT_MUNICIPALITY: &str = "Itirapina";

pub static MUNICIPALITIES: [Municipality; 35] = [
    m("Itirapina", "SP", -22.2530, -47.8228, 1.00),
    m("São Paulo", "SP", -23.5505, -46.6333, 1.05),
    m("Campinas", "SP", -22.9056, -47.0608, 1.00),
    m("Ribeirão Preto", "SP", -21.1775, -47.8103, 0.95),
    m("São Carlos", "SP", -22.0175, -47.8908, 1.00),
    m("Piracicaba", "SP", -22.7253, -47.6492, 0.98),
    m("Bauru", "SP", -22.3147, -49.0606, 0.92),
    m("Sorocaba", "SP", -23.5015, -47.4526, 1.02),
    m("Santos", "SP", -23.9608, -46.3336, 1.30),
    m("Rio Branco", "AC", -9.9747, -67.8076, 1.35),
    m("Maceió", "AL", -9.6658, -35.7353, 1.10),
    m("Macapá", "AP", 0.0349, -51.0694, 1.40),
    m("Manaus", "AM", -3.1190, -60.0217, 1.50),
    m("Salvador", "BA", -12.9777, -38.5016, 1.15),
    m("Fortaleza", "CE", -3.7319, -38.5267, 0.85),
    m("Brasília", "DF", -15.7939, -47.8828, 0.95),
    m("Vitória", "ES", -20.3155, -40.3128, 1.05),
    m("Goiânia", "GO", -16.6869, -49.2648, 0.95),
    m("São Luís", "MA", -2.5307, -44.3068, 1.20),
    m("Cuiabá", "MT", -15.6014, -56.0979, 0.90),
    m("Campo Grande", "MS", -20.4697, -54.6201, 0.95),
    m("Belo Horizonte", "MG", -19.9167, -43.9345, 0.98),
    m("Belém", "PA", -1.4558, -48.4902, 1.55),
    m("João Pessoa", "PB", -7.1195, -34.8450, 1.00),
    m("Curitiba", "PR", -25.4284, -49.2733, 1.08),
    m("Recife", "PE", -8.0476, -34.8770, 1.12),
    m("Teresina", "PI", -5.0920, -42.8038, 0.80),
    m("Rio de Janeiro", "RJ", -22.9068, -43.1729, 1.05),
    m("Natal", "RN", -5.7945, -35.2110, 0.90),
    m("Porto Alegre", "RS", -30.0346, -51.2177, 1.10),
    m("Porto Velho", "RO", -8.7612, -63.9004, 1.35),
    m("Boa Vista", "RR", 2.8235, -60.6758, 1.20),
    m("Florianópolis", "SC", -27.5954, -48.5480, 1.12),
    m("Aracaju", "SE", -10.9472, -37.0731, 1.00),
    m("Palmas", "TO", -10.1840, -48.3336, 0.92),
];

/// Federative units, as `(abbreviation, name)`.
pub static STATES: [(&str, &str); 27] = [
    ("AC", "Acre"),
    ("AL", "Alagoas"),
    ("AM", "Amazonas"),
    ("AP", "Amapá"),
    ("BA", "Bahia"),
    ("CE", "Ceará"),
    ("DF", "Distrito Federal"),
    ("ES", "Espírito Santo"),
    ("GO", "Goiás"),
    ("MA", "Maranhão"),
    ("MG", "Minas Gerais"),
    ("MS", "Mato Grosso do Sul"),
    ("MT", "Mato Grosso"),
    ("PA", "Pará"),
    ("PB", "Paraíba"),
    ("PE", "Pernambuco"),
    ("PI", "Piauí"),
    ("PR", "Paraná"),
    ("RJ", "Rio de Janeiro"),
    ("RN", "Rio Grande do Norte"),
    ("RO", "Rondônia"),
    ("RR", "Roraima"),
    ("RS", "Rio Grande do Sul"),
    ("SC", "Santa Catarina"),
    ("SE", "Sergipe"),
    ("SP", "São Paulo"),
    ("TO", "Tocantins"),
];

/// Case and accent insensitive lookup by name.
pub fn find(name: &str) -> Option<&'static Municipality> {
    let wanted = fold(name);
    MUNICIPALITIES.iter().find(|m| fold(m.name) == wanted)
}

pub fn lookup(name: &str) -> Result<&'static Municipality, ValidationError> {
    find(name).ok_or_else(|| ValidationError::UnknownMunicipality(name.to_string()))
}

pub fn in_state(state: &str) -> impl Iterator<Item = &'static Municipality> + '_ {
    MUNICIPALITIES
        .iter()
        .filter(move |m| m.state.eq_ignore_ascii_case(state))
}

/// Lowercase and strip Portuguese diacritics.
fn fold(s: &str) -> String {
    s.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case_and_accents() {
        let sp = find("sao paulo").expect("São Paulo must be listed");
        assert_eq!(sp.state, "SP");
        assert_eq!(find("  BELÉM ").map(|m| m.state), Some("PA"));
        assert_eq!(find("Ribeirao Preto").map(|m| m.name), Some("Ribeirão Preto"));
    }

    #[test]
    fn unknown_municipality_errors() {
        let err = lookup("Atlantis").unwrap_err();
        assert!(err.to_string().contains("Unknown municipality 'Atlantis'"));
    }

    #[test]
    fn default_is_first_and_listed() {
        assert_eq!(MUNICIPALITIES[0].name, DEFAULT_MUNICIPALITY);
    }

    #[test]
    fn every_municipality_belongs_to_a_known_state() {
        for m in &MUNICIPALITIES {
            assert!(STATES.iter().any(|(uf, _)| *uf == m.state), "{} has unknown state", m.name);
            assert!(m.factor > 0.0);
        }
    }

    #[test]
    fn names_are_unique() {
        for (i, a) in MUNICIPALITIES.iter().enumerate() {
            for b in &MUNICIPALITIES[i + 1..] {
                assert_ne!(fold(a.name), fold(b.name));
            }
        }
    }

    #[test]
    fn state_filter() {
        assert_eq!(in_state("sp").count(), 9);
        assert_eq!(in_state("AM").count(), 1);
    }
}
