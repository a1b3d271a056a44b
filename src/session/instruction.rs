//! The instruction string sent with every request of a session.

/// Role preamble for the assistant.
pub const ANALYST_ROLE: &str = "Sei un esperto analista finanziario. Fornisci analisi dettagliate e professionali basate sulle richieste dell'utente.";

/// Build the instruction string for a loaded statement.
///
/// Depends on nothing but the document text, so two sessions over the same
/// statement always share the same instruction.
pub fn build_instruction(document_text: &str) -> String {
    format!(
        "{ANALYST_ROLE}\n\n\
         Ti è stato fornito il seguente bilancio:\n\n\
         <bilancio>\n{}\n</bilancio>\n\n\
         Rispondi alle richieste dell'utente basandoti esclusivamente su questo bilancio.",
        document_text.trim_end()
    )
}
