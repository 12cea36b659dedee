//! Cash-register operations: movements, daily base, day summary

use super::models::*;
use crate::store::{Record, RecordKey, RecordStore, Resource, StoreError};
use chrono::{FixedOffset, Local, NaiveDate, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CajaError {
    #[error("Ya existe una base diaria registrada para {fecha}")]
    BaseAlreadyExists { fecha: NaiveDate },

    #[error("Tipo de movimiento no válido: {0}")]
    TipoInvalido(String),

    #[error("Monto no válido: {0}")]
    MontoInvalido(f64),

    #[error("Movimiento mal formado: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of opening the day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseDiariaCreada {
    pub base: Record,
    pub movimiento: Record,
}

/// Manager for the cash register
pub struct CajaManager {
    store: Arc<dyn RecordStore>,
    /// Fixed offset for calendar-date comparisons; `None` follows the host
    offset: Option<FixedOffset>,
}

impl CajaManager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            offset: None,
        }
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = Some(offset);
        self
    }

    fn offset(&self) -> FixedOffset {
        self.offset
            .unwrap_or_else(|| Local::now().offset().fix())
    }

    /// Today's calendar date in the manager's timezone
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset()).date_naive()
    }

    /// RFC 3339 timestamp that falls on `fecha` in the manager's timezone:
    /// now if `fecha` is today, otherwise the current wall-clock time on `fecha`
    fn stamp_on(&self, fecha: NaiveDate) -> String {
        let offset = self.offset();
        let now = Utc::now().with_timezone(&offset);
        if now.date_naive() == fecha {
            return now.to_rfc3339();
        }
        offset
            .from_local_datetime(&fecha.and_time(now.time()))
            .single()
            .unwrap_or(now)
            .to_rfc3339()
    }

    // ========================================================================
    // Movements
    // ========================================================================

    /// Every movement that parses; malformed rows are logged and skipped
    pub async fn movimientos(&self) -> Result<Vec<Movimiento>, CajaError> {
        let rows = self.store.list(Resource::Caja).await?;
        Ok(rows
            .iter()
            .filter_map(|row| match Movimiento::from_record(row) {
                Ok(m) => Some(m),
                Err(e) => {
                    warn!(row = ?row.get("id_movimiento"), "Skipping malformed movement: {}", e);
                    None
                }
            })
            .collect())
    }

    pub async fn registrar(&self, movimiento: &Movimiento) -> Result<Record, CajaError> {
        if !movimiento.monto.is_finite() || movimiento.monto < 0.0 {
            return Err(CajaError::MontoInvalido(movimiento.monto));
        }
        let row = self
            .store
            .insert(Resource::Caja, &movimiento.to_record())
            .await?;
        info!(
            tipo = %movimiento.tipo,
            monto = movimiento.monto,
            id_pedido = ?movimiento.id_pedido,
            "Movement recorded"
        );
        Ok(row)
    }

    pub async fn por_tipo(&self, tipo: &str) -> Result<Vec<Record>, CajaError> {
        let tipo: TipoMovimiento = tipo.parse().map_err(CajaError::TipoInvalido)?;
        Ok(self
            .store
            .find_by(Resource::Caja, "tipo", &Value::from(tipo.as_str()))
            .await?)
    }

    pub async fn por_pedido(&self, id_pedido: &str) -> Result<Vec<Record>, CajaError> {
        let key = RecordKey::parse(id_pedido);
        Ok(self
            .store
            .find_by(Resource::Caja, "id_pedido", &key.to_value())
            .await?)
    }

    /// Totals of the movements dated `fecha`
    pub async fn resumen(&self, fecha: NaiveDate) -> Result<ResumenCaja, CajaError> {
        let offset = self.offset();
        let del_dia: Vec<Movimiento> = self
            .movimientos()
            .await?
            .into_iter()
            .filter(|m| m.local_date(&offset) == Some(fecha))
            .collect();

        let sum = |tipo: TipoMovimiento| {
            del_dia
                .iter()
                .filter(|m| m.tipo == tipo)
                .map(|m| m.monto)
                .sum::<f64>()
        };
        let entradas = sum(TipoMovimiento::Entrada);
        let salidas = sum(TipoMovimiento::Salida);

        Ok(ResumenCaja {
            fecha: fecha.to_string(),
            entradas,
            salidas,
            saldo: entradas - salidas,
            movimientos: del_dia.len(),
        })
    }

    // ========================================================================
    // Daily base
    // ========================================================================

    /// Whether the opening cash for `fecha` exists, and its amount.
    ///
    /// `bases_diarias` is authoritative. Marker movements that no row there
    /// links to are still recognised by their own date.
    pub async fn verificar_base_diaria(
        &self,
        fecha: NaiveDate,
    ) -> Result<BaseDiariaEstado, CajaError> {
        let rows = self
            .store
            .find_by(
                Resource::BasesDiarias,
                "fecha",
                &Value::from(fecha.to_string()),
            )
            .await?;

        if let Some(row) = rows.first() {
            return Ok(BaseDiariaEstado {
                existe: true,
                monto: row.get("monto").and_then(Value::as_f64).unwrap_or(0.0),
                fecha: fecha.to_string(),
                id_movimiento: row.get("id_movimiento").and_then(Value::as_i64),
            });
        }

        let linked: HashSet<i64> = self
            .store
            .list(Resource::BasesDiarias)
            .await?
            .iter()
            .filter_map(|row| row.get("id_movimiento").and_then(Value::as_i64))
            .collect();
        let sueltos: Vec<Movimiento> = self
            .movimientos()
            .await?
            .into_iter()
            .filter(|m| m.id_movimiento.map_or(true, |id| !linked.contains(&id)))
            .collect();
        Ok(match find_daily_base(&sueltos, fecha, &self.offset()) {
            Some(m) => BaseDiariaEstado {
                existe: true,
                monto: m.monto,
                fecha: fecha.to_string(),
                id_movimiento: m.id_movimiento,
            },
            None => BaseDiariaEstado::ausente(fecha),
        })
    }

    /// Record the opening cash for `fecha`.
    ///
    /// The day is claimed in `bases_diarias` before the movement is written;
    /// the unique index on `fecha` turns a concurrent second claim into
    /// [`CajaError::BaseAlreadyExists`].
    pub async fn crear_base_diaria(
        &self,
        monto: f64,
        id_usuario: Option<i64>,
        fecha: NaiveDate,
    ) -> Result<BaseDiariaCreada, CajaError> {
        if !monto.is_finite() || monto < 0.0 {
            return Err(CajaError::MontoInvalido(monto));
        }

        if self.verificar_base_diaria(fecha).await?.existe {
            return Err(CajaError::BaseAlreadyExists { fecha });
        }

        let mut claim = Record::new();
        claim.insert("fecha".into(), Value::from(fecha.to_string()));
        claim.insert("monto".into(), Value::from(monto));
        claim.insert(
            "id_usuario".into(),
            id_usuario.map(Value::from).unwrap_or(Value::Null),
        );

        let base = match self.store.insert(Resource::BasesDiarias, &claim).await {
            Ok(row) => row,
            Err(e) if e.is_unique_violation() => {
                return Err(CajaError::BaseAlreadyExists { fecha });
            }
            Err(e) => return Err(e.into()),
        };
        let base_key = RecordKey::from_record(Resource::BasesDiarias, &base);

        let movimiento = Movimiento::new(
            TipoMovimiento::Entrada,
            format!("{} Base de caja {}", BASE_MARKER, fecha),
            monto,
        )
        .with_fecha(self.stamp_on(fecha))
        .with_usuario(id_usuario);

        let movimiento = match self.registrar(&movimiento).await {
            Ok(row) => row,
            Err(e) => {
                if let Some(key) = &base_key {
                    if let Err(undo) = self.store.delete(Resource::BasesDiarias, key).await {
                        warn!(fecha = %fecha, "Failed to release daily base claim: {}", undo);
                    }
                }
                return Err(e);
            }
        };

        let mut link = Record::new();
        link.insert(
            "id_movimiento".into(),
            movimiento
                .get("id_movimiento")
                .cloned()
                .unwrap_or(Value::Null),
        );
        let base = match &base_key {
            Some(key) => self
                .store
                .update(Resource::BasesDiarias, key, &link)
                .await?
                .unwrap_or(base),
            None => base,
        };

        info!(fecha = %fecha, monto, "Daily base created");
        Ok(BaseDiariaCreada { base, movimiento })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::MockStore;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn manager() -> (Arc<MockStore>, CajaManager) {
        let store = Arc::new(MockStore::new());
        let manager = CajaManager::new(store.clone())
            .with_offset(FixedOffset::east_opt(0).unwrap());
        (store, manager)
    }

    #[tokio::test]
    async fn test_verify_without_base() {
        let (_, manager) = manager();
        let estado = manager
            .verificar_base_diaria(date("2026-10-16"))
            .await
            .unwrap();
        assert!(!estado.existe);
        assert_eq!(estado.monto, 0.0);
        assert_eq!(estado.fecha, "2026-10-16");
    }

    #[tokio::test]
    async fn test_verify_recognises_legacy_marker_movement() {
        let (_, manager) = manager();
        manager
            .registrar(
                &Movimiento::new(
                    TipoMovimiento::Entrada,
                    format!("{} apertura", BASE_MARKER),
                    30000.0,
                )
                .with_fecha("2026-10-16T13:00:00+00:00"),
            )
            .await
            .unwrap();

        let estado = manager
            .verificar_base_diaria(date("2026-10-16"))
            .await
            .unwrap();
        assert!(estado.existe);
        assert_eq!(estado.monto, 30000.0);
        assert_eq!(estado.id_movimiento, Some(1));

        let otro_dia = manager
            .verificar_base_diaria(date("2026-10-17"))
            .await
            .unwrap();
        assert!(!otro_dia.existe);
    }

    #[tokio::test]
    async fn test_create_then_verify() {
        let (store, manager) = manager();
        let today = manager.today();
        let creada = manager
            .crear_base_diaria(50000.0, Some(2), today)
            .await
            .unwrap();

        assert_eq!(creada.base["id_movimiento"], creada.movimiento["id_movimiento"]);
        assert!(creada.movimiento["descripcion"]
            .as_str()
            .unwrap()
            .contains(BASE_MARKER));

        let estado = manager.verificar_base_diaria(today).await.unwrap();
        assert!(estado.existe);
        assert_eq!(estado.monto, 50000.0);
        assert_eq!(store.count(Resource::Caja).await, 1);
    }

    #[tokio::test]
    async fn test_base_for_another_day_leaves_today_open() {
        let (store, manager) = manager();
        let today = manager.today();
        let ayer = today.pred_opt().unwrap();

        let creada = manager.crear_base_diaria(40000.0, None, ayer).await.unwrap();
        let fecha = creada.movimiento["fecha"].as_str().unwrap();
        assert!(fecha.starts_with(&ayer.to_string()), "stamped {}", fecha);

        assert!(!manager.verificar_base_diaria(today).await.unwrap().existe);
        assert_eq!(manager.resumen(ayer).await.unwrap().entradas, 40000.0);
        assert_eq!(manager.resumen(today).await.unwrap().movimientos, 0);

        manager.crear_base_diaria(55000.0, None, today).await.unwrap();
        let estado = manager.verificar_base_diaria(today).await.unwrap();
        assert!(estado.existe);
        assert_eq!(estado.monto, 55000.0);
        assert_eq!(store.count(Resource::BasesDiarias).await, 2);
    }

    #[tokio::test]
    async fn test_linked_marker_only_counts_for_its_own_base() {
        let (store, manager) = manager();
        let movimiento = manager
            .registrar(
                &Movimiento::new(TipoMovimiento::Entrada, format!("{} Base", BASE_MARKER), 1.0)
                    .with_fecha("2026-10-16T09:00:00+00:00"),
            )
            .await
            .unwrap();
        store
            .insert(
                Resource::BasesDiarias,
                &serde_json::json!({
                    "fecha": "2026-10-15",
                    "monto": 1.0,
                    "id_movimiento": movimiento["id_movimiento"],
                })
                .as_object()
                .cloned()
                .unwrap(),
            )
            .await
            .unwrap();

        assert!(!manager.verificar_base_diaria(date("2026-10-16")).await.unwrap().existe);
        assert!(manager.verificar_base_diaria(date("2026-10-15")).await.unwrap().existe);
    }

    #[tokio::test]
    async fn test_serialized_creation_yields_one_base() {
        let (store, manager) = manager();
        let today = date("2026-10-16");
        manager.crear_base_diaria(50000.0, None, today).await.unwrap();

        let err = manager
            .crear_base_diaria(60000.0, None, today)
            .await
            .unwrap_err();
        assert!(matches!(err, CajaError::BaseAlreadyExists { .. }));
        assert_eq!(store.count(Resource::BasesDiarias).await, 1);
        assert_eq!(store.count(Resource::Caja).await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_creation_yields_one_base() {
        let (store, manager) = manager();
        let manager = Arc::new(manager);
        let today = date("2026-10-16");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    manager
                        .crear_base_diaria(1000.0 * (i + 1) as f64, None, today)
                        .await
                })
            })
            .collect();

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(CajaError::BaseAlreadyExists { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(ok, 1);
        assert_eq!(store.count(Resource::BasesDiarias).await, 1);
        assert_eq!(store.count(Resource::Caja).await, 1);
    }

    #[tokio::test]
    async fn test_negative_amount_rejected() {
        let (_, manager) = manager();
        let err = manager
            .crear_base_diaria(-1.0, None, date("2026-10-16"))
            .await
            .unwrap_err();
        assert!(matches!(err, CajaError::MontoInvalido(_)));
    }

    #[tokio::test]
    async fn test_por_tipo_and_resumen() {
        let (_, manager) = manager();
        for (tipo, monto) in [
            (TipoMovimiento::Entrada, 20000.0),
            (TipoMovimiento::Entrada, 5000.0),
            (TipoMovimiento::Salida, 7000.0),
        ] {
            manager
                .registrar(
                    &Movimiento::new(tipo, "mov", monto).with_fecha("2026-10-16T15:00:00+00:00"),
                )
                .await
                .unwrap();
        }
        manager
            .registrar(
                &Movimiento::new(TipoMovimiento::Entrada, "ayer", 99.0)
                    .with_fecha("2026-10-15T15:00:00+00:00"),
            )
            .await
            .unwrap();

        assert_eq!(manager.por_tipo("salida").await.unwrap().len(), 1);
        assert!(matches!(
            manager.por_tipo("prestamo").await,
            Err(CajaError::TipoInvalido(_))
        ));

        let resumen = manager.resumen(date("2026-10-16")).await.unwrap();
        assert_eq!(resumen.entradas, 25000.0);
        assert_eq!(resumen.salidas, 7000.0);
        assert_eq!(resumen.saldo, 18000.0);
        assert_eq!(resumen.movimientos, 3);
    }

    #[tokio::test]
    async fn test_por_pedido() {
        let (_, manager) = manager();
        manager
            .registrar(&Movimiento::new(TipoMovimiento::Entrada, "Abono", 10000.0).with_pedido(7))
            .await
            .unwrap();
        manager
            .registrar(&Movimiento::new(TipoMovimiento::Entrada, "Otro", 1.0).with_pedido(8))
            .await
            .unwrap();
        let rows = manager.por_pedido("7").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["descripcion"], "Abono");
    }
}
