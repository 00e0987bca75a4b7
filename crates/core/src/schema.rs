//! Static prompt context describing the single table the assistant may query.
//!
//! The column hints are the only schema knowledge the model receives; nothing
//! here is introspected from the live database.

/// One column of the facility table together with a plain-language hint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnHint {
    pub name: &'static str,
    pub description: &'static str,
}

impl ColumnHint {
    pub const fn new(name: &'static str, description: &'static str) -> Self {
        Self { name, description }
    }

    /// Bracket-quoted identifier, e.g. `[FSF NAME]`.
    pub fn quoted(&self) -> String {
        format!("[{}]", self.name)
    }
}

pub const FACILITY_COLUMNS: &[ColumnHint] = &[
    ColumnHint::new("FSF#", "Facility's unique identifier number."),
    ColumnHint::new("FSF NAME", "Official facility name (e.g., restaurant or grocery store name)."),
    ColumnHint::new("FSF ADDRESS", "Street address of the facility."),
    ColumnHint::new("FSF CITY", "City in which the facility is located."),
    ColumnHint::new("FSF STATE", "U.S. state of the facility."),
    ColumnHint::new("FSF ZIP", "Facility ZIP/postal code."),
    ColumnHint::new("FSF PHONE#", "Facility contact phone number."),
    ColumnHint::new("BUSINESS NAME", "Registered business name or legal entity of the facility."),
    ColumnHint::new("OWNERS FIRST NAME", "First name of the facility owner."),
    ColumnHint::new("OWNERS LAST NAME", "Last name of the facility owner."),
    ColumnHint::new("OWNERS ADDRESS", "Owner's home or mailing address."),
    ColumnHint::new("OWNERS CITY", "City for the owner's address."),
    ColumnHint::new("OWNER STATE", "State for the owner's address."),
    ColumnHint::new("OWNERS ZIP", "ZIP/postal code for the owner's address."),
    ColumnHint::new("OWNERS PHONE", "Owner's primary phone number."),
    ColumnHint::new("OWNERS E-MAIL", "Owner's email address."),
    ColumnHint::new("CONTACT NAME", "Primary contact person for the facility (not always the owner)."),
    ColumnHint::new("CONTACT PHONE", "Contact person's phone number."),
    ColumnHint::new("CONTACT E-MAIL", "Contact person's email address."),
    ColumnHint::new("AREA", "Geographic inspection or service area."),
    ColumnHint::new("FACILITY TYPE", "Category of facility (e.g., restaurant, school kitchen, retail food store)."),
    ColumnHint::new("RISK", "Risk classification level (1 = high, 2 = medium, 3 = low)."),
    ColumnHint::new("SEASONAL", "Indicates if the facility operates seasonally (e.g., open only in summer)."),
    ColumnHint::new("EXEMPT", "Whether the facility is exempt from certain permit requirements."),
    ColumnHint::new("CITY OF ANNAPOLIS", "Flag indicating if the facility is within Annapolis city limits."),
    ColumnHint::new("PERMIT ISSUE DATE", "Date when the operating permit was issued."),
    ColumnHint::new("PERMIT EXPIRATION DATE", "Date when the permit expires."),
    ColumnHint::new("FACILITY SEATING NUMBER", "Number of seats available for customers."),
    ColumnHint::new("SEPTIC DESIGN SEATING#", "Number of seats approved in septic design."),
    ColumnHint::new("WATER", "Water supply type (e.g., public, private well)."),
    ColumnHint::new("SEWER", "Sewer type (e.g., public, septic)."),
    ColumnHint::new("GREAT TRAP", "Grease trap; indicates if grease control equipment is installed."),
    ColumnHint::new("GREASE RECOVERY", "Indicates if grease recovery system is used."),
    ColumnHint::new("COMMENT 1", "Inspector comments or notes."),
    ColumnHint::new("TAX ID", "Tax identification number for the business."),
    ColumnHint::new("INSPECTOR#", "Unique ID for assigned inspector."),
    ColumnHint::new("PLAN REVIEW FEE", "Fee for reviewing facility construction/renovation plans."),
    ColumnHint::new("PLAN REVIEW PAID DATE", "Date plan review fee was paid."),
    ColumnHint::new("HACCP FEE", "Fee associated with HACCP (Hazard Analysis Critical Control Point) review."),
    ColumnHint::new("HACCP PAID DATE", "Date HACCP fee was paid."),
    ColumnHint::new("APPLICATION FEE", "Fee for the facility's permit application."),
    ColumnHint::new("APPLICATION PAID DATE", "Date the application fee was paid."),
    ColumnHint::new("APPLICATION REC DATE", "Date the application was received."),
    ColumnHint::new("OPEN DATE", "Date facility was opened for business."),
    ColumnHint::new("CLOSED DATE", "Date facility was permanently closed (if applicable)."),
    ColumnHint::new("CI INSP DATE", "Date of the initial Critical Item inspection."),
    ColumnHint::new("CI INSPECTOR #", "Inspector ID for the Critical Item inspection."),
    ColumnHint::new("Critical Item CODE", "Code describing the specific critical violation observed."),
    ColumnHint::new("CI RE DATE", "Date of first re-inspection after a critical violation."),
    ColumnHint::new("CI RE INSPECTOR #", "Inspector ID for the re-inspection."),
    ColumnHint::new("Critical Item RE CODE", "Code describing the issue during re-inspection."),
    ColumnHint::new("CI RE2 DATE", "Date of second re-inspection for a critical violation."),
    ColumnHint::new("CI RE2 ISPECTOR #", "Inspector ID for second re-inspection."),
    ColumnHint::new("Critical ItemRE2 CODE", "Violation code for second re-inspection."),
    ColumnHint::new("CIRE3 DATE", "Date of third re-inspection (if any)."),
    ColumnHint::new("CI RE3 INSPECTOR #", "Inspector ID for third re-inspection."),
    ColumnHint::new("Critical Item R3 CODE", "Violation code during third re-inspection."),
    ColumnHint::new("CIRE NEEDED", "Indicates if additional re-inspection is needed."),
    ColumnHint::new("M1 INSPECTION DATE", "Date of the first M1 (routine) inspection."),
    ColumnHint::new("M1 INSPECTOR#", "Inspector ID for M1 inspection."),
    ColumnHint::new("M1 INSP Critical Item CODE", "Violation codes found in M1 inspection."),
    ColumnHint::new("M1 RE DATE", "Date of first M1 re-inspection."),
    ColumnHint::new("M1 RE INSPECTOR#", "Inspector ID for first M1 re-inspection."),
    ColumnHint::new("M1 RE Critical Item CODE", "Violation codes found during first M1 re-inspection."),
    ColumnHint::new("M1 RE2 DATE", "Date of second M1 re-inspection."),
    ColumnHint::new("M1 RE2 INSPECTOR#", "Inspector ID for second M1 re-inspection."),
    ColumnHint::new("M1RE 2 Critical Item CODE", "Violation codes during second M1 re-inspection."),
    ColumnHint::new("M1 RE3 DATE", "Date of third M1 re-inspection."),
    ColumnHint::new("M1 RE3 INSPECTOR#", "Inspector ID for third M1 re-inspection."),
    ColumnHint::new("M1RE3 Critical Item CODE", "Violation codes during third M1 re-inspection."),
    ColumnHint::new("M1RE NEEDED", "Indicates if further M1 re-inspection is needed."),
    ColumnHint::new("M2 INSP DATE", "Date of M2 inspection."),
    ColumnHint::new("M2 INSP#", "Inspector ID for M2 inspection."),
    ColumnHint::new("M2 Critical Item CODE", "Violation codes for M2 inspection."),
    ColumnHint::new("M2 RE DATE", "Date of M2 re-inspection."),
    ColumnHint::new("M2 RE INSP#", "Inspector ID for M2 re-inspection."),
    ColumnHint::new("M2 RE Critical Item CODE", "Violation codes during M2 re-inspection."),
    ColumnHint::new("M2 RE2 DATE", "Date of second M2 re-inspection."),
    ColumnHint::new("M2 RE2 ISNPEC#", "Inspector ID for second M2 re-inspection."),
    ColumnHint::new("M2 R2 Critical Item CODE", "Violation codes during second M2 re-inspection."),
    ColumnHint::new("M2 RE3 DATE", "Date of third M2 re-inspection."),
    ColumnHint::new("M2 RE3 INSP#", "Inspector ID for third M2 re-inspection."),
    ColumnHint::new("M2RE3 Critical Item CODE", "Violation codes during third M2 re-inspection."),
    ColumnHint::new("M2 RE NEEDED", "Indicates if further M2 re-inspection is needed."),
    ColumnHint::new("BO#", "Back office or business office identifier (meaning unconfirmed)."),
    ColumnHint::new("HACCP update", "Notes or date of last HACCP plan update."),
    ColumnHint::new("HACCP update inspector#", "Inspector responsible for HACCP update."),
    ColumnHint::new("HACCP update inspector name", "Name of HACCP update inspector."),
    ColumnHint::new("F89", "Legacy spreadsheet column; purpose unknown."),
    ColumnHint::new("inserted", "System field marking when the record was inserted."),
    ColumnHint::new("itemid", "Legacy spreadsheet column; purpose unknown."),
    ColumnHint::new("addressitem", "Possibly linked address reference key."),
    ColumnHint::new("insertednum", "Internal insertion sequence or counter."),
];

/// Columns the summarizer is asked to lead with.
pub const IDENTITY_COLUMNS: &[&str] = &[
    "FSF NAME",
    "FSF ADDRESS",
    "FSF CITY",
    "FSF STATE",
    "FSF ZIP",
    "FSF PHONE#",
    "BUSINESS NAME",
    "CONTACT NAME",
    "CONTACT PHONE",
];

const ROLE: &str = "You are an expert assistant helping health inspectors query a Microsoft SQL Server database.\n\
The database contains inspection, permit, and facility information for food establishments in Anne Arundel County.";

const FORMATTING_RULES: &str = "Formatting rules:\n\
- NEVER include backticks (`) or Markdown code fences (```sql ... ```).\n\
- NEVER prefix or suffix queries with ``` or quotes.\n\
- Write the query as raw SQL text, not Markdown.\n\
- End each query with a semicolon only if needed.\n\
- Output ONLY the SQL code, with no explanations and no commentary.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaContext {
    table: String,
    columns: &'static [ColumnHint],
}

impl SchemaContext {
    pub fn for_table(table: impl Into<String>) -> Self {
        Self { table: table.into(), columns: FACILITY_COLUMNS }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn quoted_table(&self) -> String {
        format!("[{}]", self.table)
    }

    pub fn columns(&self) -> &[ColumnHint] {
        self.columns
    }

    /// Full system prompt: role, T-SQL and quoting rules, formatting rules,
    /// and one hint line per column.
    pub fn render(&self) -> String {
        let table = self.quoted_table();
        let mut prompt = String::with_capacity(8 * 1024);
        prompt.push_str(ROLE);
        prompt.push('\n');
        prompt.push_str(&format!("Only use the table {table}.\n"));
        prompt.push_str(
            "All column names contain spaces and must be wrapped in [square brackets].\n",
        );
        prompt.push_str("Use only SELECT statements; never INSERT, UPDATE, or DELETE.\n");
        prompt.push_str("You write SQL queries ONLY for Microsoft SQL Server (T-SQL).\n");
        prompt.push_str("Never use MySQL or PostgreSQL syntax.\n\n");
        prompt.push_str(FORMATTING_RULES);
        prompt.push_str(&format!(
            "\n- Always wrap column and table names in [square brackets], like [FSF NAME] or {table}.\n\n"
        ));
        prompt.push_str(&format!("Column hints for the {table} table:\n"));
        prompt.push_str(&self.table_info());
        prompt
    }

    /// Column list only, one `[name] -> hint` line per column.
    pub fn table_info(&self) -> String {
        self.columns
            .iter()
            .map(|column| format!("{} -> {}\n", column.quoted(), column.description))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{SchemaContext, FACILITY_COLUMNS, IDENTITY_COLUMNS};

    #[test]
    fn rendered_prompt_restricts_to_single_bracketed_table() {
        let context = SchemaContext::for_table("AACountyexcel");
        let prompt = context.render();

        assert!(prompt.contains("Only use the table [AACountyexcel]."));
        assert!(prompt.contains("Use only SELECT statements"));
        assert!(prompt.contains("NEVER include backticks"));
        assert!(prompt.contains("[FSF NAME] -> Official facility name"));
        assert!(prompt.ends_with("[insertednum] -> Internal insertion sequence or counter.\n"));
    }

    #[test]
    fn column_names_are_unique() {
        let names: HashSet<_> = FACILITY_COLUMNS.iter().map(|column| column.name).collect();
        assert_eq!(names.len(), FACILITY_COLUMNS.len());
        assert!(FACILITY_COLUMNS.len() > 90);
    }

    #[test]
    fn identity_columns_exist_in_schema() {
        let context = SchemaContext::for_table("AACountyexcel");
        for name in IDENTITY_COLUMNS {
            assert!(
                context.columns().iter().any(|column| column.name == *name),
                "missing identity column {name}"
            );
        }
    }

    #[test]
    fn table_info_has_one_line_per_column() {
        let context = SchemaContext::for_table("AACountyexcel");
        assert_eq!(context.table_info().lines().count(), FACILITY_COLUMNS.len());
    }
}
