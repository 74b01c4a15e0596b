//! 数据库查询操作

use std::collections::HashMap;

use async_trait::async_trait;
use ris_assignment::DataStore;
use ris_core::{Assignment, Radiologist, Result, RisError, Shift};
use sqlx::{PgPool, Row};

use crate::models::{DbRadiologist, DbShift};

/// DataStore 的PostgreSQL实现
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        // 放射科医生表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS radiologists (
                id VARCHAR(64) PRIMARY KEY,
                first_name VARCHAR(255) NOT NULL,
                last_name VARCHAR(255) NOT NULL,
                credentials TEXT[] NOT NULL DEFAULT '{}',
                specialties TEXT[] NOT NULL DEFAULT '{}',
                max_concurrent_studies INTEGER NOT NULL DEFAULT 0,
                status VARCHAR(20) NOT NULL DEFAULT 'active',
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(&self.pool).await.map_err(|e| RisError::Database(e.to_string()))?;

        // 班次表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS shifts (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                work_type VARCHAR(64) NOT NULL,
                sites TEXT[] NOT NULL DEFAULT '{}',
                priority_level INTEGER NOT NULL DEFAULT 0,
                required_credentials TEXT[] NOT NULL DEFAULT '{}',
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(&self.pool).await.map_err(|e| RisError::Database(e.to_string()))?;

        // 排班表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS roster_entries (
                id BIGSERIAL PRIMARY KEY,
                shift_id BIGINT NOT NULL REFERENCES shifts(id),
                radiologist_id VARCHAR(64) NOT NULL REFERENCES radiologists(id),
                start_date DATE NOT NULL,
                end_date DATE,
                status VARCHAR(20) NOT NULL DEFAULT 'active',
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                UNIQUE (shift_id, radiologist_id, start_date)
            )
        "#).execute(&self.pool).await.map_err(|e| RisError::Database(e.to_string()))?;

        // 分配规则表，条件谓词以JSONB原样保存
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS assignment_rules (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                priority_order INTEGER NOT NULL DEFAULT 100,
                condition_filters JSONB NOT NULL DEFAULT '{}',
                action_type VARCHAR(32) NOT NULL,
                action_target VARCHAR(255) NOT NULL DEFAULT '',
                enabled BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(&self.pool).await.map_err(|e| RisError::Database(e.to_string()))?;

        // 分配记录表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS assignments (
                id BIGSERIAL PRIMARY KEY,
                study_id VARCHAR(64) NOT NULL,
                radiologist_id VARCHAR(64) NOT NULL,
                shift_id BIGINT NOT NULL DEFAULT 0,
                assigned_at TIMESTAMP WITH TIME ZONE NOT NULL,
                escalated BOOLEAN NOT NULL DEFAULT FALSE,
                strategy VARCHAR(255) NOT NULL DEFAULT '',
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(&self.pool).await.map_err(|e| RisError::Database(e.to_string()))?;

        // 创建索引以优化查询性能
        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let indexes = vec![
            "CREATE INDEX IF NOT EXISTS idx_shifts_work_type ON shifts(work_type)",
            "CREATE INDEX IF NOT EXISTS idx_roster_entries_shift_id ON roster_entries(shift_id)",
            "CREATE INDEX IF NOT EXISTS idx_roster_entries_radiologist_id ON roster_entries(radiologist_id)",
            "CREATE INDEX IF NOT EXISTS idx_assignment_rules_enabled ON assignment_rules(enabled)",
            "CREATE INDEX IF NOT EXISTS idx_assignments_radiologist_id ON assignments(radiologist_id)",
            "CREATE INDEX IF NOT EXISTS idx_assignments_study_id ON assignments(study_id)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| RisError::Database(e.to_string()))?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }
}

#[async_trait]
impl DataStore for PostgresStore {
    /// 按工作类型子串匹配班次；站点与部位由调用侧传入供将来收窄
    async fn get_shifts_by_work_type(
        &self,
        modality: &str,
        _body_part: &str,
        _site: &str,
    ) -> Result<Vec<Shift>> {
        let results = sqlx::query_as::<_, DbShift>(
            "SELECT id, name, work_type, sites, priority_level, required_credentials
             FROM shifts WHERE work_type LIKE $1",
        )
        .bind(format!("%{}%", modality))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RisError::Database(e.to_string()))?;

        Ok(results.into_iter().map(Shift::from).collect())
    }

    /// 单次批量取回放射科医生记录
    async fn get_radiologists(&self, ids: &[String]) -> Result<Vec<Radiologist>> {
        let results = sqlx::query_as::<_, DbRadiologist>(
            "SELECT id, first_name, last_name, credentials, specialties,
                    max_concurrent_studies, status
             FROM radiologists WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RisError::Database(e.to_string()))?;

        Ok(results.into_iter().map(Radiologist::from).collect())
    }

    /// 单次聚合查询取回候选集工作量
    async fn get_radiologist_workloads(&self, ids: &[String]) -> Result<HashMap<String, i64>> {
        let rows = sqlx::query(
            "SELECT radiologist_id, COUNT(*) AS current_load
             FROM assignments WHERE radiologist_id = ANY($1)
             GROUP BY radiologist_id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RisError::Database(e.to_string()))?;

        let mut workloads = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("radiologist_id");
            let load: i64 = row.get("current_load");
            workloads.insert(id, load);
        }
        Ok(workloads)
    }

    async fn save_assignment(&self, assignment: &Assignment) -> Result<()> {
        sqlx::query(
            "INSERT INTO assignments (study_id, radiologist_id, shift_id, assigned_at, escalated, strategy)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&assignment.study_id)
        .bind(&assignment.radiologist_id)
        .bind(assignment.shift_id)
        .bind(assignment.assigned_at)
        .bind(assignment.escalated)
        .bind(&assignment.strategy)
        .execute(&self.pool)
        .await
        .map_err(|e| RisError::Database(e.to_string()))?;

        Ok(())
    }
}
