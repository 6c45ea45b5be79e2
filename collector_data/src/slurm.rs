use chrono::NaiveDateTime;

/// Format used by `sacct` for `Start`/`End` and accepted for `--starttime`/`--endtime`.
pub const SLURM_DATETIME_FMT: &str = "%Y-%m-%dT%H:%M:%S";

/// Slurm takes _local_ time without an offset (the `+xx:yy` suffix of `%+` is rejected), so every
/// timestamp handled here is naive local time.
pub fn format_datetime_for_slurm(date: NaiveDateTime) -> String {
    date.format(SLURM_DATETIME_FMT).to_string()
}

/// `Unknown`, `None` and empty fields (pending or never-started jobs) map to `None`.
pub fn parse_slurm_datetime(input: &str) -> color_eyre::Result<Option<NaiveDateTime>> {
    use color_eyre::eyre::WrapErr as _;

    match input.trim() {
        "" | "Unknown" | "None" => Ok(None),
        s => NaiveDateTime::parse_from_str(s, SLURM_DATETIME_FMT)
            .map(Some)
            .wrap_err_with(|| format!("parsing slurm timestamp `{s}`")),
    }
}

#[allow(non_snake_case)]
#[cfg(test)]
mod test {
    use chrono::NaiveDate;
    use color_eyre::Result;

    use super::*;

    #[test]
    fn format_datetime_for_slurm__no_offset() -> Result<()> {
        let date = NaiveDate::from_ymd_opt(2014, 5, 1).and_then(|d| d.and_hms_opt(11, 43, 26));
        assert_eq!(format_datetime_for_slurm(date.ok_or_else(|| color_eyre::eyre::eyre!("date"))?), "2014-05-01T11:43:26");
        Ok(())
    }

    #[test]
    fn parse_slurm_datetime__unknown_is_none() -> Result<()> {
        assert_eq!(parse_slurm_datetime("Unknown")?, None);
        assert_eq!(parse_slurm_datetime("")?, None);
        assert!(parse_slurm_datetime("2014-05-01T11:43:26")?.is_some());
        assert!(parse_slurm_datetime("01.05.2014").is_err());
        Ok(())
    }
}
