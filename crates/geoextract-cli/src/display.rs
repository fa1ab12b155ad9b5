use geoextract_core::Division;
use tabled::{Table, Tabled};

#[derive(Tabled)]
pub struct DivisionRow {
    #[tabled(rename = "Id")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Subtype")]
    pub subtype: String,
    #[tabled(rename = "Class")]
    pub class: String,
}

impl From<&Division> for DivisionRow {
    fn from(division: &Division) -> Self {
        Self {
            id: division.id.clone(),
            name: division.name.clone(),
            subtype: division.subtype.clone().unwrap_or_else(|| "N/A".to_string()),
            class: division.class.clone().unwrap_or_else(|| "N/A".to_string()),
        }
    }
}

/// Render the resolved division as a one-row table.
pub fn division_table(division: &Division) -> String {
    Table::new([DivisionRow::from(division)]).to_string()
}

/// Display the resolved division.
pub fn display_division(division: &Division) {
    println!("Found division: {}", division.name);
    println!("{}", division_table(division));
}
