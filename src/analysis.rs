//! Canned analyses offered alongside free-form questions.

use serde::{Deserialize, Serialize};

/// One of the predefined analyses of a financial statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Reclassification of the balance sheet and income statement.
    Reclassification,
    /// Main financial ratios.
    KeyRatios,
    /// Cash-flow analysis.
    CashFlow,
    /// Assessment of the financial position.
    FinancialPosition,
}

impl AnalysisKind {
    /// Every preset, in display order.
    pub const ALL: [Self; 4] = [
        Self::Reclassification,
        Self::KeyRatios,
        Self::CashFlow,
        Self::FinancialPosition,
    ];

    /// Label shown to the user.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Reclassification => "Riclassificazione del bilancio",
            Self::KeyRatios => "Analisi dei principali indici",
            Self::CashFlow => "Analisi del cash flow",
            Self::FinancialPosition => "Valutazione della situazione patrimoniale",
        }
    }

    /// The user turn submitted when this preset is chosen.
    #[must_use]
    pub fn prompt(self) -> String {
        format!(
            "L'utente ha richiesto un'analisi su: {}\n\n\
             Fornisci un'analisi dettagliata e professionale basata su questa richiesta.",
            self.label()
        )
    }

    /// Recover the preset a user turn was generated from.
    #[must_use]
    pub fn from_prompt(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.prompt() == text)
    }
}
