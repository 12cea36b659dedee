//! Typed service functions.
//!
//! Each mutating call emits its [`DataEvent`] only after the server
//! confirmed the change, so subscribers never refetch for a failed write.

use super::{ApiClient, ClientResult};
use crate::api::auth_handlers::LoginResponse;
use crate::caja::{BaseDiariaCreada, BaseDiariaEstado, ResumenCaja};
use crate::events::{CrudAction, DataEvent};
use crate::pedidos::{Devolucion, EstadoPedido, Factura, PedidoCreado};
use crate::store::{Record, Resource};
use chrono::{Local, NaiveDate};
use serde_json::{json, Value};
use tracing::info;

fn table_path(resource: Resource) -> String {
    format!("/api/{}", resource.table())
}

fn record_path(resource: Resource, id: impl std::fmt::Display) -> String {
    format!("/api/{}/{}", resource.table(), id)
}

impl ApiClient {
    fn emit(&self, event: DataEvent) {
        self.bus.emit(event);
    }

    // ========================================================================
    // Generic tables
    // ========================================================================

    pub async fn listar(&self, resource: Resource) -> ClientResult<Vec<Record>> {
        self.get(&table_path(resource)).await
    }

    pub async fn obtener(
        &self,
        resource: Resource,
        id: impl std::fmt::Display,
    ) -> ClientResult<Record> {
        self.get(&record_path(resource, id)).await
    }

    pub async fn crear(&self, resource: Resource, record: &Record) -> ClientResult<Record> {
        let row: Record = self
            .post(&table_path(resource), &Value::Object(record.clone()))
            .await?;
        self.emit(DataEvent::registro(
            resource,
            CrudAction::Created,
            Some(row.clone()),
        ));
        Ok(row)
    }

    pub async fn actualizar(
        &self,
        resource: Resource,
        id: impl std::fmt::Display,
        changes: &Record,
    ) -> ClientResult<Record> {
        let row: Record = self
            .put(&record_path(resource, id), &Value::Object(changes.clone()))
            .await?;
        self.emit(DataEvent::registro(
            resource,
            CrudAction::Updated,
            Some(row.clone()),
        ));
        Ok(row)
    }

    pub async fn eliminar(
        &self,
        resource: Resource,
        id: impl std::fmt::Display,
    ) -> ClientResult<Record> {
        let confirmation: Record = self.delete(&record_path(resource, id)).await?;
        self.emit(DataEvent::registro(
            resource,
            CrudAction::Deleted,
            Some(confirmation.clone()),
        ));
        Ok(confirmation)
    }

    // ========================================================================
    // Clients
    // ========================================================================

    pub async fn crear_cliente(&self, cliente: &Record) -> ClientResult<Record> {
        let row: Record = self
            .post("/api/clientes", &Value::Object(cliente.clone()))
            .await?;
        self.emit(DataEvent::ClienteCreado(row.clone()));
        Ok(row)
    }

    pub async fn actualizar_cliente(&self, id: i64, cambios: &Record) -> ClientResult<Record> {
        let row: Record = self
            .put(
                &format!("/api/clientes/{}", id),
                &Value::Object(cambios.clone()),
            )
            .await?;
        self.emit(DataEvent::ClienteActualizado(row.clone()));
        Ok(row)
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// Create an order; the down-payment movement, when the server records
    /// one, is announced as well.
    pub async fn crear_pedido(&self, pedido: &Record) -> ClientResult<PedidoCreado> {
        let creado: PedidoCreado = self
            .post("/api/pedidos", &Value::Object(pedido.clone()))
            .await?;
        self.emit(DataEvent::PedidoCreado(creado.pedido.clone()));
        if let Some(abono) = &creado.abono {
            self.emit(DataEvent::MovimientoCreado(abono.clone()));
        }
        Ok(creado)
    }

    pub async fn cambiar_estado_pedido(
        &self,
        id: i64,
        estado: EstadoPedido,
    ) -> ClientResult<Record> {
        let row: Record = self
            .put(
                &format!("/api/pedidos/{}/estado", id),
                &json!({ "estado": estado.as_str() }),
            )
            .await?;
        self.emit(DataEvent::PedidoActualizado(row.clone()));
        Ok(row)
    }

    pub async fn devolver_pedido(
        &self,
        id: i64,
        monto: Option<f64>,
        motivo: Option<&str>,
    ) -> ClientResult<Devolucion> {
        let devolucion: Devolucion = self
            .post(
                &format!("/api/pedidos/{}/devolucion", id),
                &json!({ "monto": monto, "motivo": motivo }),
            )
            .await?;
        self.emit(DataEvent::PedidoActualizado(devolucion.pedido.clone()));
        if let Some(movimiento) = &devolucion.movimiento {
            self.emit(DataEvent::MovimientoCreado(movimiento.clone()));
        }
        Ok(devolucion)
    }

    pub async fn factura_pedido(&self, id: i64) -> ClientResult<Factura> {
        self.get(&format!("/api/pedidos/{}/factura", id)).await
    }

    // ========================================================================
    // Cash register
    // ========================================================================

    pub async fn movimientos(&self) -> ClientResult<Vec<Record>> {
        self.get("/api/caja").await
    }

    pub async fn registrar_movimiento(&self, movimiento: &Record) -> ClientResult<Record> {
        let row: Record = self
            .post("/api/caja", &Value::Object(movimiento.clone()))
            .await?;
        self.emit(DataEvent::MovimientoCreado(row.clone()));
        Ok(row)
    }

    /// Whether today's opening cash exists, "today" being this machine's
    /// local date
    pub async fn verificar_base_diaria(&self) -> ClientResult<BaseDiariaEstado> {
        self.verificar_base_diaria_en(Local::now().date_naive())
            .await
    }

    pub async fn verificar_base_diaria_en(&self, fecha: NaiveDate) -> ClientResult<BaseDiariaEstado> {
        self.get(&format!("/api/caja/base-diaria?fecha={}", fecha))
            .await
    }

    /// Record today's opening cash (local date)
    pub async fn crear_base_diaria(&self, monto: f64) -> ClientResult<BaseDiariaCreada> {
        self.crear_base_diaria_en(monto, Local::now().date_naive())
            .await
    }

    pub async fn crear_base_diaria_en(
        &self,
        monto: f64,
        fecha: NaiveDate,
    ) -> ClientResult<BaseDiariaCreada> {
        let creada: BaseDiariaCreada = self
            .post(
                "/api/caja/base-diaria",
                &json!({ "monto": monto, "fecha": fecha.to_string() }),
            )
            .await?;
        self.emit(DataEvent::MovimientoCreado(creada.movimiento.clone()));
        self.emit(DataEvent::BaseDiariaCreada(creada.base.clone()));
        Ok(creada)
    }

    pub async fn resumen_caja(&self, fecha: NaiveDate) -> ClientResult<ResumenCaja> {
        self.get(&format!("/api/caja/resumen?fecha={}", fecha)).await
    }

    // ========================================================================
    // Users and roles
    // ========================================================================

    pub async fn crear_usuario(&self, usuario: &Record) -> ClientResult<Record> {
        let row: Record = self
            .post("/api/usuarios", &Value::Object(usuario.clone()))
            .await?;
        self.emit(DataEvent::UsuarioCambiado(row.clone()));
        Ok(row)
    }

    pub async fn actualizar_usuario(&self, id: i64, cambios: &Record) -> ClientResult<Record> {
        let row: Record = self
            .put(
                &format!("/api/usuarios/{}", id),
                &Value::Object(cambios.clone()),
            )
            .await?;
        self.emit(DataEvent::UsuarioCambiado(row.clone()));
        Ok(row)
    }

    pub async fn eliminar_usuario(&self, id: i64) -> ClientResult<Record> {
        let confirmation: Record = self.delete(&format!("/api/usuarios/{}", id)).await?;
        self.emit(DataEvent::UsuarioCambiado(confirmation.clone()));
        Ok(confirmation)
    }

    pub async fn permisos_rol(&self, id_rol: i64) -> ClientResult<Vec<Record>> {
        self.get(&format!("/api/roles/{}/permisos", id_rol)).await
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    pub async fn combinaciones_detalle(&self) -> ClientResult<Vec<Record>> {
        self.get("/api/combinaciones/detalle").await
    }

    pub async fn cajones_con_codigos(&self) -> ClientResult<Vec<Record>> {
        self.get("/api/cajones-con-codigos").await
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Log in and keep the session token for later calls
    pub async fn login(&self, usuario: &str, password: &str) -> ClientResult<LoginResponse> {
        let sesion: LoginResponse = self
            .post(
                "/api/auth/login",
                &json!({ "usuario": usuario, "password": password }),
            )
            .await?;
        self.set_token(sesion.token.clone());
        info!(usuario, "Session started");
        self.emit(DataEvent::SesionIniciada {
            usuario: usuario.to_string(),
        });
        Ok(sesion)
    }

    /// Drop the session token; purely local
    pub fn logout(&self) {
        self.set_token(None);
        self.emit(DataEvent::SesionCerrada);
    }

    pub async fn recuperar_password(&self, email: &str) -> ClientResult<()> {
        let _: Value = self
            .post("/api/auth/recuperar", &json!({ "email": email }))
            .await?;
        Ok(())
    }

    pub async fn restablecer_password(&self, token: &str, password: &str) -> ClientResult<()> {
        let _: Value = self
            .post(
                "/api/auth/restablecer",
                &json!({ "token": token, "password": password }),
            )
            .await?;
        Ok(())
    }
}
