// src/db/vedtak.rs
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::domain::avkorting::Avkorting;
use crate::domain::vedtak::{Attestasjon, Vedtak, VedtakFattet, VedtakStatus};
use crate::errors::ServerError;

const VEDTAK_KOLONNER: &str = "id, behandling_id, sak_id, vedtak_type, status, virkningstidspunkt, \
     saksbehandler, fattet_enhet, fattet_tidspunkt, attestant, attestert_enhet, \
     attestert_tidspunkt, avkorting_snapshot, opprettet";

fn vedtak_fra_rad(r: &Row<'_>) -> rusqlite::Result<Vedtak> {
    let fattet = match (r.get::<_, Option<String>>(6)?, r.get(7)?, r.get(8)?) {
        (Some(ansvarlig_saksbehandler), Some(ansvarlig_enhet), Some(tidspunkt)) => {
            Some(VedtakFattet {
                ansvarlig_saksbehandler,
                ansvarlig_enhet,
                tidspunkt,
            })
        }
        _ => None,
    };
    let attestasjon = match (r.get::<_, Option<String>>(9)?, r.get(10)?, r.get(11)?) {
        (Some(attestant), Some(attesterende_enhet), Some(tidspunkt)) => Some(Attestasjon {
            attestant,
            attesterende_enhet,
            tidspunkt,
        }),
        _ => None,
    };
    let avkorting = match r.get::<_, Option<String>>(12)? {
        Some(raw) => Some(serde_json::from_str::<Avkorting>(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(12, Type::Text, Box::new(e))
        })?),
        None => None,
    };

    Ok(Vedtak {
        id: r.get(0)?,
        behandling_id: r.get(1)?,
        sak_id: r.get(2)?,
        vedtak_type: r.get(3)?,
        status: r.get(4)?,
        virkningstidspunkt: r.get(5)?,
        fattet,
        attestasjon,
        avkorting,
        opprettet: r.get(13)?,
    })
}

pub fn hent_vedtak(conn: &Connection, behandling_id: Uuid) -> Result<Option<Vedtak>, ServerError> {
    conn.query_row(
        &format!("select {VEDTAK_KOLONNER} from vedtak where behandling_id = ?"),
        params![behandling_id],
        vedtak_fra_rad,
    )
    .optional()
    .map_err(|e| ServerError::DbError(format!("select vedtak failed: {e}")))
}

/// Inserts or fully overwrites the row for `vedtak.behandling_id`.
pub fn lagre_vedtak(conn: &Connection, vedtak: &Vedtak) -> Result<(), ServerError> {
    let snapshot = vedtak
        .avkorting
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| ServerError::internal(format!("serialize avkorting snapshot failed: {e}")))?;

    conn.execute(
        &format!(
            r#"
            insert into vedtak ({VEDTAK_KOLONNER})
            values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            on conflict(behandling_id) do update set
                vedtak_type = excluded.vedtak_type,
                status = excluded.status,
                virkningstidspunkt = excluded.virkningstidspunkt,
                saksbehandler = excluded.saksbehandler,
                fattet_enhet = excluded.fattet_enhet,
                fattet_tidspunkt = excluded.fattet_tidspunkt,
                attestant = excluded.attestant,
                attestert_enhet = excluded.attestert_enhet,
                attestert_tidspunkt = excluded.attestert_tidspunkt,
                avkorting_snapshot = excluded.avkorting_snapshot
            "#
        ),
        params![
            vedtak.id,
            vedtak.behandling_id,
            vedtak.sak_id,
            vedtak.vedtak_type,
            vedtak.status,
            vedtak.virkningstidspunkt,
            vedtak.fattet.as_ref().map(|f| f.ansvarlig_saksbehandler.as_str()),
            vedtak.fattet.as_ref().map(|f| f.ansvarlig_enhet.as_str()),
            vedtak.fattet.as_ref().map(|f| f.tidspunkt),
            vedtak.attestasjon.as_ref().map(|a| a.attestant.as_str()),
            vedtak.attestasjon.as_ref().map(|a| a.attesterende_enhet.as_str()),
            vedtak.attestasjon.as_ref().map(|a| a.tidspunkt),
            snapshot,
            vedtak.opprettet,
        ],
    )
    .map_err(|e| ServerError::DbError(format!("upsert vedtak failed: {e}")))?;
    Ok(())
}

/// Avkorting snapshots from attested decisions in a sak, oldest first.
pub fn hent_attesterte_avkortinger(
    conn: &Connection,
    sak_id: i64,
) -> Result<Vec<Avkorting>, ServerError> {
    let mut stmt = conn.prepare(
        r#"
        select avkorting_snapshot from vedtak
        where sak_id = ? and status = ? and avkorting_snapshot is not null
        order by attestert_tidspunkt, opprettet
        "#,
    )?;
    let rows = stmt.query_map(params![sak_id, VedtakStatus::Attestert], |r| {
        r.get::<_, String>(0)
    })?;

    let mut avkortinger = Vec::new();
    for row in rows {
        let raw = row?;
        let avkorting = serde_json::from_str(&raw)
            .map_err(|e| ServerError::internal(format!("corrupt avkorting snapshot: {e}")))?;
        avkortinger.push(avkorting);
    }
    Ok(avkortinger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::periode::Maaned;
    use crate::domain::vedtak::VedtakType;
    use crate::tests::utils::test_conn;
    use chrono::{TimeZone, Utc};

    fn vedtak(sak_id: i64) -> Vedtak {
        Vedtak {
            id: Uuid::new_v4(),
            behandling_id: Uuid::new_v4(),
            sak_id,
            vedtak_type: VedtakType::Innvilgelse,
            status: VedtakStatus::Opprettet,
            virkningstidspunkt: Maaned::januar(2024),
            fattet: None,
            attestasjon: None,
            avkorting: None,
            opprettet: Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn upsert_keeps_one_row_per_behandling() {
        let (_dir, conn) = test_conn();
        let mut v = vedtak(1);
        lagre_vedtak(&conn, &v).unwrap();

        v.status = VedtakStatus::FattetVedtak;
        v.fattet = Some(VedtakFattet {
            ansvarlig_saksbehandler: "Z123456".into(),
            ansvarlig_enhet: "4808".into(),
            tidspunkt: Utc.with_ymd_and_hms(2024, 1, 11, 8, 0, 0).unwrap(),
        });
        v.avkorting = Some(Avkorting::default());
        lagre_vedtak(&conn, &v).unwrap();

        assert_eq!(hent_vedtak(&conn, v.behandling_id).unwrap(), Some(v));
        assert_eq!(hent_vedtak(&conn, Uuid::new_v4()).unwrap(), None);
    }

    #[test]
    fn only_attested_snapshots_are_history() {
        let (_dir, conn) = test_conn();
        let mut attestert = vedtak(5);
        attestert.status = VedtakStatus::Attestert;
        attestert.avkorting = Some(Avkorting::default());
        attestert.attestasjon = Some(Attestasjon {
            attestant: "Z999999".into(),
            attesterende_enhet: "4808".into(),
            tidspunkt: Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap(),
        });
        lagre_vedtak(&conn, &attestert).unwrap();

        let mut utkast = vedtak(5);
        utkast.avkorting = Some(Avkorting::default());
        lagre_vedtak(&conn, &utkast).unwrap();

        assert_eq!(hent_attesterte_avkortinger(&conn, 5).unwrap().len(), 1);
        assert!(hent_attesterte_avkortinger(&conn, 6).unwrap().is_empty());
    }
}
