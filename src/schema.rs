/// Column-name constants for kit-reconcile tables.
/// Single source of truth - exported to Python via PyO3.

// ── Outbound identity columns (canonical, after rename) ─────────────────────
pub mod outbound {
    pub const ORDER_ID: &str = "Order_ID";
    pub const LOCATION: &str = "Location";
    pub const TERRITORY: &str = "Territory";
    pub const SALES_REP: &str = "SalesRep";

    /// Identity fields in their positional order (columns 0-3).
    pub const IDENTITY: [&str; 4] = [ORDER_ID, LOCATION, TERRITORY, SALES_REP];
}

// ── Inbound columns (canonical, after rename) ───────────────────────────────
pub mod inbound {
    pub const LOCATION_ID: &str = "Location_ID";
    pub const LOCATION: &str = "Location";
    pub const TERRITORY: &str = "Territory";
    pub const YEAR_MONTH: &str = "YearMonth";
    pub const TUBE_TYPE: &str = "TubeType";
    pub const COUNT: &str = "Count";

    pub const REQUIRED: [&str; 6] = [YEAR_MONTH, LOCATION_ID, TERRITORY, LOCATION, TUBE_TYPE, COUNT];
}

// ── Reconciled table columns ────────────────────────────────────────────────
pub mod reconciled {
    pub const LOCATION_ID: &str = "location_id";
    pub const LOCATION: &str = "location";
    pub const TERRITORY: &str = "territory";
    pub const YEAR_MONTH: &str = "year_month";
    pub const TUBE_TYPE: &str = "tube_type";
    pub const TUBES_SENT: &str = "tubes_sent";
    pub const SAMPLES_RETURNED: &str = "samples_returned";
    pub const REMAINING: &str = "remaining";
}

// ── Aggregate columns ───────────────────────────────────────────────────────
pub mod aggregate {
    pub const TOTAL_REMAINING: &str = "total_remaining";
}

// ── Tube type codes ─────────────────────────────────────────────────────────
pub mod tube_type {
    pub const ACD: &str = "ACD";
    pub const BLUE: &str = "Blue";
    pub const LAV: &str = "Lav";
    pub const SST: &str = "SST";
}
