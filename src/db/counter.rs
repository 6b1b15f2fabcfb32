use super::{municipality, Error, Tx};

impl Tx<'_> {
    /// Increments the municipality's folio counter and returns the new
    /// value, creating the counter at zero if it does not exist yet.
    ///
    /// The UPDATE takes a row-exclusive lock that is held until this
    /// transaction ends, so all concurrent issuances for the same
    /// municipality serialize here.
    pub async fn increment_counter(
        &self,
        municipality: municipality::Id,
    ) -> Result<i32, Error> {
        const INIT_SQL: &str = "\
            INSERT INTO ticket_counters (municipality_id, last_number) \
            VALUES ($1, 0) \
            ON CONFLICT (municipality_id) DO NOTHING";
        const BUMP_SQL: &str = "\
            UPDATE ticket_counters \
            SET last_number = last_number + 1 \
            WHERE municipality_id = $1 \
            RETURNING last_number";

        self.0.execute(INIT_SQL, &[&municipality]).await?;
        Ok(self
            .0
            .query_one(BUMP_SQL, &[&municipality])
            .await?
            .get("last_number"))
    }
}
