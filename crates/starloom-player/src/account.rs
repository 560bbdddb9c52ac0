//! The player's bank account: credits, crew salaries, debts and net worth.
//!
//! [`Account::step`] runs once per game day. It pays salaries first, then
//! every outstanding [`Mortgage`] in order, records the day's net worth and
//! adjusts the credit score. A payment that cannot be made is missed, not
//! partially made, and a missed payment adds a day of interest to the
//! principal.
//!
//! # Invariants
//!
//! - The credit score stays within [`MIN_CREDIT_SCORE`, `MAX_CREDIT_SCORE`].
//! - The net-worth history holds at most [`HISTORY`] + 1 days.
//! - A mortgage whose principal reaches zero is removed in the same step.

use starloom_conditions::expression::to_i64;
use starloom_data::{DataNode, DataWriter};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Days of net worth kept for the yearly revenue estimate.
pub const HISTORY: usize = 100;

/// Credit score of a new pilot.
pub const DEFAULT_CREDIT_SCORE: i64 = 400;

/// Lowest possible credit score.
pub const MIN_CREDIT_SCORE: i64 = 200;

/// Highest possible credit score.
pub const MAX_CREDIT_SCORE: i64 = 800;

/// Term of a bank mortgage, in days.
const MORTGAGE_TERM: i64 = 365;

/// Term of a fine, in days.
const FINE_TERM: i64 = 60;

// ---------------------------------------------------------------------------
// Mortgage
// ---------------------------------------------------------------------------

/// What kind of debt a [`Mortgage`] is. Only bank mortgages count as
/// "mortgage payments" in the daily summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebtKind {
    /// A loan from the bank.
    Mortgage,
    /// A fine owed to a government.
    Fine,
    /// A debt taken on through a mission or conversation.
    Debt,
}

impl DebtKind {
    const fn token(self) -> &'static str {
        match self {
            Self::Mortgage => "Mortgage",
            Self::Fine => "Fine",
            Self::Debt => "Debt",
        }
    }

    fn from_token(token: &str) -> Self {
        match token {
            "Fine" => Self::Fine,
            "Debt" => Self::Debt,
            _ => Self::Mortgage,
        }
    }
}

/// Daily interest rate for a credit score.
pub fn interest_for_score(score: i64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let score = score as f64;
    (600. - score / 2.) * 0.000_01
}

/// A debt repaid in equal daily installments.
#[derive(Debug, Clone, PartialEq)]
pub struct Mortgage {
    kind: DebtKind,
    principal: i64,
    interest: f64,
    term: i64,
}

impl Mortgage {
    /// A bank mortgage priced by `credit_score`.
    pub fn new(principal: i64, credit_score: i64) -> Self {
        Self {
            kind: DebtKind::Mortgage,
            principal,
            interest: interest_for_score(credit_score),
            term: MORTGAGE_TERM,
        }
    }

    /// An interest-free fine due over sixty days.
    pub const fn fine(amount: i64) -> Self {
        Self {
            kind: DebtKind::Fine,
            principal: amount,
            interest: 0.,
            term: FINE_TERM,
        }
    }

    /// A debt with explicit daily interest and term.
    pub fn debt(principal: i64, interest: f64, term: i64) -> Self {
        Self {
            kind: DebtKind::Debt,
            principal,
            interest: interest.max(0.),
            term: term.max(1),
        }
    }

    /// What kind of debt this is.
    pub const fn kind(&self) -> DebtKind {
        self.kind
    }

    /// Amount still owed.
    pub const fn principal(&self) -> i64 {
        self.principal
    }

    /// Daily interest rate.
    pub const fn interest(&self) -> f64 {
        self.interest
    }

    /// Days left.
    pub const fn term(&self) -> i64 {
        self.term
    }

    /// Today's installment.
    pub fn payment(&self) -> i64 {
        if self.principal <= 0 {
            return 0;
        }
        if self.term <= 1 {
            return self.principal.saturating_add(self.accrued());
        }
        #[allow(clippy::cast_precision_loss)]
        let (principal, term) = (self.principal as f64, self.term as f64);
        if self.interest <= 0. {
            return to_i64((principal / term).ceil());
        }
        let factor = (1. + self.interest).powf(-term);
        to_i64(principal * self.interest / (1. - factor))
    }

    fn accrued(&self) -> i64 {
        #[allow(clippy::cast_precision_loss)]
        let principal = self.principal as f64;
        to_i64(principal * self.interest)
    }

    /// Pay today's installment and return what was paid.
    pub fn make_payment(&mut self) -> i64 {
        let payment = self.payment();
        self.principal = self
            .principal
            .saturating_add(self.accrued())
            .saturating_sub(payment)
            .max(0);
        self.term = self.term.saturating_sub(1);
        if self.term <= 0 {
            self.principal = 0;
        }
        payment
    }

    /// Skip today's installment; the interest is added to the principal.
    pub fn miss_payment(&mut self) {
        self.principal = self.principal.saturating_add(self.accrued());
    }

    /// Pay `amount` off the principal early.
    pub fn pay_extra(&mut self, amount: i64) {
        self.principal = self.principal.saturating_sub(amount).max(0);
    }

    fn load(node: &DataNode) -> Self {
        let mut mortgage = Self::debt(0, 0., 1);
        if node.size() >= 2 {
            mortgage.kind = DebtKind::from_token(node.token(1));
        }
        for child in node.children().iter().filter(|c| c.size() >= 2) {
            match child.key() {
                "principal" => mortgage.principal = to_i64(child.value(1)),
                "interest" => mortgage.interest = child.value(1),
                "term" => mortgage.term = to_i64(child.value(1)),
                _ => {
                    child.print_trace("Skipping unrecognized attribute:");
                }
            }
        }
        mortgage
    }

    fn save(&self, writer: &mut DataWriter) {
        writer.write(["mortgage", self.kind.token()]);
        writer.begin_child();
        writer.write(["principal".to_owned(), self.principal.to_string()]);
        writer.write_key_value("interest", self.interest);
        writer.write(["term".to_owned(), self.term.to_string()]);
        writer.end_child();
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// Credits, salaries owed, debts and a short net-worth history.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    credits: i64,
    salaries_owed: i64,
    credit_score: i64,
    history: Vec<i64>,
    mortgages: Vec<Mortgage>,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            credits: 0,
            salaries_owed: 0,
            credit_score: DEFAULT_CREDIT_SCORE,
            history: Vec::new(),
            mortgages: Vec::new(),
        }
    }
}

impl Account {
    /// An empty account with the default credit score.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits on hand.
    pub const fn credits(&self) -> i64 {
        self.credits
    }

    /// Add (or with a negative value, remove) credits.
    pub const fn add_credits(&mut self, value: i64) {
        self.credits = self.credits.saturating_add(value);
    }

    /// Salaries that could not be paid yet.
    pub const fn salaries_owed(&self) -> i64 {
        self.salaries_owed
    }

    /// The credit score.
    pub const fn credit_score(&self) -> i64 {
        self.credit_score
    }

    /// Outstanding debts, oldest first.
    pub fn mortgages(&self) -> &[Mortgage] {
        &self.mortgages
    }

    /// Total principal of every outstanding debt.
    pub fn total_debt(&self) -> i64 {
        self.mortgages
            .iter()
            .fold(0_i64, |total, m| total.saturating_add(m.principal))
    }

    /// Take out a bank mortgage; the principal is paid out immediately.
    pub fn add_mortgage(&mut self, principal: i64) {
        self.mortgages.push(Mortgage::new(principal, self.credit_score));
        self.add_credits(principal);
    }

    /// Record a fine. Fines are paid off over time, not immediately.
    pub fn add_fine(&mut self, amount: i64) {
        if amount > 0 {
            self.mortgages.push(Mortgage::fine(amount));
        }
    }

    /// Take on a debt; the principal is paid out immediately. Without an
    /// explicit interest rate the credit score decides it.
    pub fn add_debt(&mut self, principal: i64, interest: Option<f64>, term: i64) {
        if principal <= 0 {
            return;
        }
        let interest = interest.unwrap_or_else(|| interest_for_score(self.credit_score));
        self.mortgages.push(Mortgage::debt(principal, interest, term));
        self.add_credits(principal);
    }

    /// Pay `amount` off mortgage `index` early. Ignored if the index is out
    /// of range or the player cannot afford it.
    pub fn pay_extra(&mut self, index: usize, amount: i64) {
        let Some(mortgage) = self.mortgages.get_mut(index) else {
            return;
        };
        if amount <= 0 || amount > self.credits || amount > mortgage.principal {
            return;
        }
        mortgage.pay_extra(amount);
        self.credits = self.credits.saturating_sub(amount);
        if mortgage.principal == 0 {
            self.mortgages.remove(index);
        }
    }

    /// The largest new mortgage the player qualifies for: what a year of
    /// revenue, less current payments, can repay at the current score.
    pub fn prequalify(&self) -> i64 {
        let payments = self
            .mortgages
            .iter()
            .fold(0_i64, |total, m| total.saturating_add(m.payment()));
        let daily = self.yearly_revenue() / 365;
        let available = daily.saturating_sub(payments);
        if available <= 0 {
            return 0;
        }
        let interest = interest_for_score(self.credit_score);
        #[allow(clippy::cast_precision_loss)]
        let (available, term) = (available as f64, MORTGAGE_TERM as f64);
        let factor = 1. - (1. + interest).powf(-term);
        to_i64(available * factor / interest)
    }

    /// Net worth at the end of the last day stepped.
    pub fn net_worth(&self) -> i64 {
        self.history.last().copied().unwrap_or(0)
    }

    /// Net worth by day, oldest first.
    pub fn history(&self) -> &[i64] {
        &self.history
    }

    /// Yearly revenue extrapolated from the net-worth history.
    pub fn yearly_revenue(&self) -> i64 {
        let (Some(first), Some(last)) = (self.history.first(), self.history.last()) else {
            return 0;
        };
        if last <= first {
            return 0;
        }
        let days = i64::try_from(HISTORY).unwrap_or(i64::MAX);
        last.saturating_sub(*first).saturating_mul(365).checked_div(days).unwrap_or(0)
    }

    /// Advance one day: pay `salaries` and debts, record net worth given
    /// the value of everything else the player owns (`assets`), and return
    /// a summary of what was paid. The summary is empty on a day with no
    /// payments.
    pub fn step(&mut self, assets: i64, salaries: i64) -> String {
        let mut out = String::new();

        self.salaries_owed = self.salaries_owed.saturating_add(salaries.max(0));
        let has_debts = !self.mortgages.is_empty() || self.salaries_owed > 0;
        let mut paid = true;

        let mut salaries_paid = self.salaries_owed;
        if self.salaries_owed > 0 {
            if self.salaries_owed > self.credits {
                salaries_paid = self.credits.max(0);
                self.salaries_owed = self.salaries_owed.saturating_sub(salaries_paid);
                self.credits = self.credits.saturating_sub(salaries_paid);
                paid = false;
                out.push_str("You could not pay all your crew salaries. ");
            } else {
                self.credits = self.credits.saturating_sub(self.salaries_owed);
                self.salaries_owed = 0;
            }
        }

        let mut mortgages_paid = 0_i64;
        let mut other_paid = 0_i64;
        let mut assets = assets;
        for mortgage in &mut self.mortgages {
            if mortgage.payment() > self.credits {
                mortgage.miss_payment();
                if paid {
                    out.push_str("You missed a mortgage payment. ");
                }
                paid = false;
            } else {
                let payment = mortgage.make_payment();
                self.credits = self.credits.saturating_sub(payment);
                if mortgage.kind == DebtKind::Mortgage {
                    mortgages_paid = mortgages_paid.saturating_add(payment);
                } else {
                    other_paid = other_paid.saturating_add(payment);
                }
            }
            assets = assets.saturating_sub(mortgage.principal);
        }
        self.mortgages.retain(|m| m.principal > 0);

        if self.history.len() > HISTORY {
            self.history.remove(0);
        }
        self.history.push(self.credits.saturating_add(assets));

        if has_debts {
            let change = if paid { 1 } else { -5 };
            self.credit_score = self
                .credit_score
                .saturating_add(change)
                .clamp(MIN_CREDIT_SCORE, MAX_CREDIT_SCORE);
        }

        out.push_str(&payment_summary(salaries_paid, mortgages_paid, other_paid));
        out
    }

    /// Read an `account` block, replacing everything.
    pub fn load(&mut self, node: &DataNode) {
        *self = Self::default();
        for child in node.children() {
            match child.key() {
                "credits" if child.size() >= 2 => self.credits = to_i64(child.value(1)),
                "salaries" if child.size() >= 2 => self.salaries_owed = to_i64(child.value(1)),
                "score" if child.size() >= 2 => self.credit_score = to_i64(child.value(1)),
                "mortgage" => self.mortgages.push(Mortgage::load(child)),
                "history" => self
                    .history
                    .extend(child.children().iter().map(|g| to_i64(g.value(0)))),
                _ => {
                    child.print_trace("Skipping unrecognized attribute:");
                }
            }
        }
    }

    /// Write an `account` block.
    pub fn save(&self, writer: &mut DataWriter) {
        writer.write(["account"]);
        writer.begin_child();
        writer.write(["credits".to_owned(), self.credits.to_string()]);
        if self.salaries_owed != 0 {
            writer.write(["salaries".to_owned(), self.salaries_owed.to_string()]);
        }
        writer.write(["score".to_owned(), self.credit_score.to_string()]);
        writer.write(["history"]);
        writer.begin_child();
        for worth in &self.history {
            writer.write([worth.to_string()]);
        }
        writer.end_child();
        for mortgage in &self.mortgages {
            mortgage.save(writer);
        }
        writer.end_child();
    }
}

fn payment_summary(salaries: i64, mortgages: i64, other: i64) -> String {
    if salaries == 0 && mortgages == 0 && other == 0 {
        return String::new();
    }
    let mut parts = Vec::new();
    if salaries != 0 {
        parts.push(format!("{salaries} credits in crew salaries"));
    }
    if mortgages != 0 {
        let unit = if parts.is_empty() { " credits" } else { "" };
        parts.push(format!("{mortgages}{unit} in mortgage payments"));
    }
    if other != 0 {
        let unit = if parts.is_empty() { " credits" } else { "" };
        parts.push(format!("{other}{unit} in other payments"));
    }
    let list = match parts.as_slice() {
        [one] => one.clone(),
        [a, b] => format!("{a} and {b}"),
        [a, b, c] => format!("{a}, {b}, and {c}"),
        _ => parts.join(", "),
    };
    format!("You paid {list}.")
}
