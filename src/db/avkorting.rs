// src/db/avkorting.rs
use rusqlite::{params, types::Type, Connection, Row};
use uuid::Uuid;

use crate::domain::avkorting::{
    Aarsoppgjoer, AvkortetYtelse, Avkorting, Avkortingsperiode, Inntektsgrunnlag, Kilde,
    RegelResultat,
};
use crate::domain::etteroppgjoer::EtteroppgjoerResultat;
use crate::domain::periode::Periode;
use crate::errors::ServerError;

fn regel_til_json(regel: &RegelResultat) -> Result<String, ServerError> {
    serde_json::to_string(regel)
        .map_err(|e| ServerError::internal(format!("serialize regel_resultat failed: {e}")))
}

/// Removes all stored avkorting rows for one behandling.
pub fn slett_avkorting(conn: &Connection, behandling_id: Uuid) -> Result<(), ServerError> {
    for tabell in ["avkortingsgrunnlag", "avkortingsperioder", "avkortet_ytelse"] {
        conn.execute(
            &format!("delete from {tabell} where behandling_id = ?"),
            params![behandling_id],
        )
        .map_err(|e| ServerError::DbError(format!("delete {tabell} failed: {e}")))?;
    }
    Ok(())
}

/// Replaces the stored avkorting for `behandling_id` with `avkorting`.
pub fn lagre_avkorting(
    conn: &Connection,
    behandling_id: Uuid,
    avkorting: &Avkorting,
) -> Result<(), ServerError> {
    slett_avkorting(conn, behandling_id)?;

    let mut grunnlag_stmt = conn.prepare(
        r#"
        insert into avkortingsgrunnlag (
            id, behandling_id, aar, fom, tom, aarsinntekt, fratrekk_inn_aar, inntekt_utland,
            fratrekk_utland, relevante_maaneder, spesifikasjon, kilde_ident, kilde_tidspunkt
        ) values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )?;
    let mut periode_stmt = conn.prepare(
        r#"
        insert into avkortingsperioder (
            id, behandling_id, aar, fom, tom, avkortingsbeloep, inntektsgrunnlag,
            regel_resultat, tidspunkt
        ) values (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )?;
    let mut ytelse_stmt = conn.prepare(
        r#"
        insert into avkortet_ytelse (
            id, behandling_id, aar, fom, tom, ytelse_foer_avkorting, avkortingsbeloep,
            restanse, ytelse_etter_avkorting, regel_resultat, tidspunkt
        ) values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )?;

    for oppgjoer in &avkorting.aarsoppgjoer {
        for g in &oppgjoer.inntektsgrunnlag {
            grunnlag_stmt
                .execute(params![
                    g.id,
                    behandling_id,
                    oppgjoer.aar,
                    g.periode.fom,
                    g.periode.tom,
                    g.aarsinntekt,
                    g.fratrekk_inn_aar,
                    g.inntekt_utland,
                    g.fratrekk_utland,
                    g.relevante_maaneder,
                    g.spesifikasjon,
                    g.kilde.ident,
                    g.kilde.tidspunkt,
                ])
                .map_err(|e| ServerError::DbError(format!("insert avkortingsgrunnlag failed: {e}")))?;
        }
        for p in &oppgjoer.avkortingsperioder {
            periode_stmt
                .execute(params![
                    p.id,
                    behandling_id,
                    oppgjoer.aar,
                    p.periode.fom,
                    p.periode.tom,
                    p.avkortingsbeloep,
                    p.inntektsgrunnlag,
                    regel_til_json(&p.regel_resultat)?,
                    p.regel_resultat.tidspunkt,
                ])
                .map_err(|e| ServerError::DbError(format!("insert avkortingsperiode failed: {e}")))?;
        }
        for y in &oppgjoer.avkortet_ytelse {
            ytelse_stmt
                .execute(params![
                    y.id,
                    behandling_id,
                    oppgjoer.aar,
                    y.periode.fom,
                    y.periode.tom,
                    y.ytelse_foer_avkorting,
                    y.avkortingsbeloep,
                    y.restanse,
                    y.ytelse_etter_avkorting,
                    regel_til_json(&y.regel_resultat)?,
                    y.regel_resultat.tidspunkt,
                ])
                .map_err(|e| ServerError::DbError(format!("insert avkortet_ytelse failed: {e}")))?;
        }
    }

    tracing::debug!(%behandling_id, aar = avkorting.aarsoppgjoer.len(), "avkorting lagret");
    Ok(())
}

fn oppgjoer_for(aarsoppgjoer: &mut Vec<Aarsoppgjoer>, aar: i32) -> &mut Aarsoppgjoer {
    let idx = match aarsoppgjoer.binary_search_by_key(&aar, |a| a.aar) {
        Ok(idx) => idx,
        Err(idx) => {
            aarsoppgjoer.insert(idx, Aarsoppgjoer::ny(aar));
            idx
        }
    };
    &mut aarsoppgjoer[idx]
}

fn regel_fra_kolonne(r: &Row<'_>, idx: usize) -> rusqlite::Result<RegelResultat> {
    let raw: String = r.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Stored avkorting for `behandling_id`. Empty if nothing is stored.
pub fn hent_avkorting(conn: &Connection, behandling_id: Uuid) -> Result<Avkorting, ServerError> {
    let mut aarsoppgjoer: Vec<Aarsoppgjoer> = Vec::new();

    let mut stmt = conn.prepare(
        r#"
        select aar, id, fom, tom, aarsinntekt, fratrekk_inn_aar, inntekt_utland, fratrekk_utland,
               relevante_maaneder, spesifikasjon, kilde_ident, kilde_tidspunkt
        from avkortingsgrunnlag
        where behandling_id = ?
        order by aar, fom
        "#,
    )?;
    let rows = stmt.query_map(params![behandling_id], |r| {
        Ok((
            r.get::<_, i32>(0)?,
            Inntektsgrunnlag {
                id: r.get(1)?,
                periode: Periode::new(r.get(2)?, r.get(3)?),
                aarsinntekt: r.get(4)?,
                fratrekk_inn_aar: r.get(5)?,
                inntekt_utland: r.get(6)?,
                fratrekk_utland: r.get(7)?,
                relevante_maaneder: r.get(8)?,
                spesifikasjon: r.get(9)?,
                kilde: Kilde {
                    ident: r.get(10)?,
                    tidspunkt: r.get(11)?,
                },
            },
        ))
    })?;
    for row in rows {
        let (aar, grunnlag) = row?;
        oppgjoer_for(&mut aarsoppgjoer, aar).inntektsgrunnlag.push(grunnlag);
    }

    let mut stmt = conn.prepare(
        r#"
        select aar, id, fom, tom, avkortingsbeloep, inntektsgrunnlag, regel_resultat
        from avkortingsperioder
        where behandling_id = ?
        order by aar, fom
        "#,
    )?;
    let rows = stmt.query_map(params![behandling_id], |r| {
        Ok((
            r.get::<_, i32>(0)?,
            Avkortingsperiode {
                id: r.get(1)?,
                periode: Periode::new(r.get(2)?, r.get(3)?),
                avkortingsbeloep: r.get(4)?,
                inntektsgrunnlag: r.get(5)?,
                regel_resultat: regel_fra_kolonne(r, 6)?,
            },
        ))
    })?;
    for row in rows {
        let (aar, periode) = row?;
        oppgjoer_for(&mut aarsoppgjoer, aar).avkortingsperioder.push(periode);
    }

    let mut stmt = conn.prepare(
        r#"
        select aar, id, fom, tom, ytelse_foer_avkorting, avkortingsbeloep, restanse,
               ytelse_etter_avkorting, regel_resultat
        from avkortet_ytelse
        where behandling_id = ?
        order by aar, fom
        "#,
    )?;
    let rows = stmt.query_map(params![behandling_id], |r| {
        Ok((
            r.get::<_, i32>(0)?,
            AvkortetYtelse {
                id: r.get(1)?,
                periode: Periode::new(r.get(2)?, r.get(3)?),
                ytelse_foer_avkorting: r.get(4)?,
                avkortingsbeloep: r.get(5)?,
                restanse: r.get(6)?,
                ytelse_etter_avkorting: r.get(7)?,
                regel_resultat: regel_fra_kolonne(r, 8)?,
            },
        ))
    })?;
    for row in rows {
        let (aar, ytelse) = row?;
        oppgjoer_for(&mut aarsoppgjoer, aar).avkortet_ytelse.push(ytelse);
    }

    Ok(Avkorting { aarsoppgjoer })
}

/// Stores a settlement, replacing any earlier one for the same year.
pub fn lagre_etteroppgjoer_resultat(
    conn: &Connection,
    resultat: &EtteroppgjoerResultat,
) -> Result<(), ServerError> {
    conn.execute(
        r#"
        insert into etteroppgjoer_beregnet_resultat (
            id, behandling_id, aar, utbetalt_avkorting, ny_avkorting, differanse,
            grense_tilbakekreving, grense_etterbetaling, resultat_type, regel_resultat, tidspunkt
        ) values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        on conflict(behandling_id, aar) do update set
            id = excluded.id,
            utbetalt_avkorting = excluded.utbetalt_avkorting,
            ny_avkorting = excluded.ny_avkorting,
            differanse = excluded.differanse,
            grense_tilbakekreving = excluded.grense_tilbakekreving,
            grense_etterbetaling = excluded.grense_etterbetaling,
            resultat_type = excluded.resultat_type,
            regel_resultat = excluded.regel_resultat,
            tidspunkt = excluded.tidspunkt
        "#,
        params![
            resultat.id,
            resultat.behandling_id,
            resultat.aar,
            resultat.utbetalt_avkorting,
            resultat.ny_avkorting,
            resultat.differanse,
            resultat.grense_tilbakekreving,
            resultat.grense_etterbetaling,
            resultat.resultat_type,
            regel_til_json(&resultat.regel_resultat)?,
            resultat.tidspunkt,
        ],
    )
    .map_err(|e| ServerError::DbError(format!("upsert etteroppgjoer failed: {e}")))?;
    Ok(())
}

pub fn hent_etteroppgjoer_resultater(
    conn: &Connection,
    behandling_id: Uuid,
) -> Result<Vec<EtteroppgjoerResultat>, ServerError> {
    let mut stmt = conn.prepare(
        r#"
        select id, behandling_id, aar, utbetalt_avkorting, ny_avkorting, differanse,
               grense_tilbakekreving, grense_etterbetaling, resultat_type, regel_resultat, tidspunkt
        from etteroppgjoer_beregnet_resultat
        where behandling_id = ?
        order by aar
        "#,
    )?;
    let rows = stmt.query_map(params![behandling_id], |r| {
        Ok(EtteroppgjoerResultat {
            id: r.get(0)?,
            behandling_id: r.get(1)?,
            aar: r.get(2)?,
            utbetalt_avkorting: r.get(3)?,
            ny_avkorting: r.get(4)?,
            differanse: r.get(5)?,
            grense_tilbakekreving: r.get(6)?,
            grense_etterbetaling: r.get(7)?,
            resultat_type: r.get(8)?,
            regel_resultat: regel_fra_kolonne(r, 9)?,
            tidspunkt: r.get(10)?,
        })
    })?;

    let mut resultater = Vec::new();
    for row in rows {
        resultater.push(row?);
    }
    Ok(resultater)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::avkorting::{NyttInntektsgrunnlag, YtelseFoerAvkorting};
    use crate::domain::etteroppgjoer::{beregn_etteroppgjoer, FaktiskInntekt};
    use crate::domain::periode::Maaned;
    use crate::tests::utils::test_conn;
    use chrono::{TimeZone, Utc};

    fn beregnet() -> Avkorting {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let fom: Maaned = "2024-03".parse().unwrap();
        let mut a = Avkorting::default();
        a.legg_til_grunnlag(
            NyttInntektsgrunnlag {
                fom,
                aarsinntekt: 350_000,
                fratrekk_inn_aar: 10_000,
                inntekt_utland: 0,
                fratrekk_utland: 0,
                relevante_maaneder: None,
                spesifikasjon: "lønn".into(),
            },
            true,
            Kilde::new("Z123456", now),
        )
        .unwrap();
        a.beregn(
            &[YtelseFoerAvkorting {
                periode: Periode::new(fom, None),
                beloep: 18_000,
            }],
            fom,
            now,
        )
        .unwrap();
        a
    }

    #[test]
    fn stored_avkorting_reads_back_unchanged() {
        let (_dir, conn) = test_conn();
        let behandling = Uuid::new_v4();
        let avkorting = beregnet();

        lagre_avkorting(&conn, behandling, &avkorting).unwrap();
        assert_eq!(hent_avkorting(&conn, behandling).unwrap(), avkorting);

        // Saving again replaces instead of duplicating.
        lagre_avkorting(&conn, behandling, &avkorting).unwrap();
        assert_eq!(hent_avkorting(&conn, behandling).unwrap(), avkorting);
    }

    #[test]
    fn behandlinger_do_not_see_each_other() {
        let (_dir, conn) = test_conn();
        let a = Uuid::new_v4();
        lagre_avkorting(&conn, a, &beregnet()).unwrap();
        // Same ids under another behandling are allowed.
        lagre_avkorting(&conn, Uuid::new_v4(), &beregnet()).unwrap();

        slett_avkorting(&conn, a).unwrap();
        assert!(hent_avkorting(&conn, a).unwrap().er_tom());
    }

    #[test]
    fn etteroppgjoer_is_upserted_per_year() {
        let (_dir, conn) = test_conn();
        let behandling = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let avkorting = beregnet();
        let oppgjoer = avkorting.aarsoppgjoer(2024).unwrap();
        let faktisk = |loenn| FaktiskInntekt {
            loennsinntekt: loenn,
            naeringsinntekt: 0,
            afp: 0,
            inntekt_utland: 0,
            spesifikasjon: String::new(),
        };

        let foerste =
            beregn_etteroppgjoer(behandling, oppgjoer, &faktisk(340_000), Kilde::new("Z1", now), now)
                .unwrap();
        lagre_etteroppgjoer_resultat(&conn, &foerste).unwrap();
        let andre =
            beregn_etteroppgjoer(behandling, oppgjoer, &faktisk(500_000), Kilde::new("Z1", now), now)
                .unwrap();
        lagre_etteroppgjoer_resultat(&conn, &andre).unwrap();

        let lagret = hent_etteroppgjoer_resultater(&conn, behandling).unwrap();
        assert_eq!(lagret, vec![andre]);
    }
}
