// services/gas/gas_engine.rs

use crate::config::OptimizerConfig;
use crate::errors::error::AppError;
use crate::infrastructure::provider::ProviderTrait;
use crate::services::gas::gas_strategy::GasPriority;
use crate::services::gas::history::{EstimateHistory, GasStats};
use crate::services::tx::types::{AnnotatedTx, DraftTx, EstimateOptions, PriceQuote, PriceSource};
use crate::utils::format::format_gwei;
use crate::utils::{scale_by_percent, utilization_bps};
use crate::{log_info, log_warn};
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Eip1559TransactionRequest, TransactionRequest, U256};
use futures_util::future::{try_join, try_join_all};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

/// 高拥堵档：区块利用率 > 80% 时加价 20%
const HIGH_CONGESTION_BPS: u64 = 8_000;
const HIGH_SURCHARGE_PERCENT: u64 = 120;
/// 低拥堵档：区块利用率 < 30% 时折价 10%
const LOW_CONGESTION_BPS: u64 = 3_000;
const LOW_DISCOUNT_PERCENT: u64 = 90;

/// Gas 定价引擎（纯整数运算，无浮点风险）
///
/// 职责：按网络拥堵度计算建议价、带缓冲估算 gas 用量、
/// 分组并发批量定价，并维护有界估算历史供统计。
/// 只定价不提交：输出的交易由调用方自行签名广播。
pub struct GasEngine {
    config: OptimizerConfig,
    provider: Arc<dyn ProviderTrait>,
    /// 估算历史：批量定价会并发追加，须持锁访问（临界区内不 await）
    history: Mutex<EstimateHistory>,
}

impl GasEngine {
    /// 构造即校验：绕过 Config::load 直接组装配置也无法带入非法值
    pub fn new(config: OptimizerConfig, provider: Arc<dyn ProviderTrait>) -> Result<Self, AppError> {
        config.validate()?;
        let history = Mutex::new(EstimateHistory::new(config.history_capacity));
        Ok(Self {
            config,
            provider,
            history,
        })
    }

    fn max_gas_price(&self) -> U256 {
        U256::from(self.config.max_gas_price_wei)
    }

    fn default_options(&self) -> EstimateOptions {
        EstimateOptions {
            priority: GasPriority::default(),
            timeout_secs: self.config.rpc_timeout_secs,
        }
    }

    /// 给 RPC 调用套上截止时间；超时即取消在途请求
    async fn with_deadline<T>(
        &self,
        timeout_secs: u64,
        fut: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        timeout(Duration::from_secs(timeout_secs), fut)
            .await
            .map_err(|_| AppError::Timeout(timeout_secs))?
    }

    /// 当前最优 gas 价格（拥堵分档调价 + 上限钳制）
    pub async fn get_optimal_gas_price(&self) -> Result<PriceQuote, AppError> {
        self.quote_price(self.config.rpc_timeout_secs).await
    }

    async fn quote_price(&self, timeout_secs: u64) -> Result<PriceQuote, AppError> {
        // 1. 基准价：此处失败没有可兜底的值，直接上抛
        let base_price = self
            .with_deadline(timeout_secs, self.provider.get_gas_price())
            .await?;

        // 2. 区块利用率：失败时降级为未调整基准价（可用性优先），只记告警
        let block = match self
            .with_deadline(timeout_secs, self.provider.get_latest_block())
            .await
        {
            Ok(block) => block,
            Err(e) => {
                log_warn!("获取最新区块失败，回退为未调整基准价: {}", e);
                return Ok(PriceQuote {
                    price: base_price.min(self.max_gas_price()),
                    source: PriceSource::Fallback,
                });
            }
        };

        // 3. 分档调整（gasLimit 为 0 → 拥堵度未知，不调整）
        let congestion_bps = utilization_bps(block.gas_used, block.gas_limit);
        let adjusted = match congestion_bps {
            Some(bps) if bps > HIGH_CONGESTION_BPS => {
                scale_by_percent(base_price, HIGH_SURCHARGE_PERCENT)?
            }
            Some(bps) if bps < LOW_CONGESTION_BPS => {
                scale_by_percent(base_price, LOW_DISCOUNT_PERCENT)?
            }
            _ => base_price,
        };

        // 4. 上限钳制：任何路径都不得超过 max_gas_price
        Ok(PriceQuote {
            price: adjusted.min(self.max_gas_price()),
            source: PriceSource::Quoted { congestion_bps },
        })
    }

    /// 按优先级档位调价（最优价 × 档位系数，再次钳制上限）
    pub async fn price_for_priority(&self, priority: GasPriority) -> Result<PriceQuote, AppError> {
        self.priced_quote(priority, self.config.rpc_timeout_secs)
            .await
    }

    async fn priced_quote(
        &self,
        priority: GasPriority,
        timeout_secs: u64,
    ) -> Result<PriceQuote, AppError> {
        let quote = self.quote_price(timeout_secs).await?;
        let scaled = scale_by_percent(quote.price, priority.multiplier_percent())?;
        Ok(PriceQuote {
            price: scaled.min(self.max_gas_price()),
            source: quote.source,
        })
    }

    /// 带缓冲的 gas 估算：floor(原始估算 × 缓冲百分比 / 100)，并记入历史
    pub async fn estimate_gas_with_buffer(&self, tx: &DraftTx) -> Result<U256, AppError> {
        self.buffered_estimate(tx, self.config.rpc_timeout_secs)
            .await
    }

    async fn buffered_estimate(&self, tx: &DraftTx, timeout_secs: u64) -> Result<U256, AppError> {
        let typed = Self::to_typed_tx(tx);

        // 模拟失败（如 revert）原样上抛：无效交易绝不能被悄悄定价
        let raw = self
            .with_deadline(timeout_secs, self.provider.estimate_gas(&typed))
            .await
            .map_err(|e| match e {
                AppError::Timeout(secs) => AppError::Timeout(secs),
                other => AppError::EstimationFailed {
                    to: format!("{:?}", tx.to),
                    reason: other.to_string(),
                },
            })?;

        let buffered = scale_by_percent(raw, self.config.gas_buffer_percent)?;

        self.history.lock().unwrap().record(raw, buffered);
        Ok(buffered)
    }

    /// 批量定价：按 batch_size 分组，组间串行、组内并发
    ///
    /// 输出与输入同序同长。单组内任一笔估算失败则整组失败，
    /// 错误中带失败交易在组内的下标；已完成组的结果不回滚。
    pub async fn batch_transactions(
        &self,
        txs: &[DraftTx],
        options: Option<EstimateOptions>,
    ) -> Result<Vec<AnnotatedTx>, AppError> {
        if txs.is_empty() {
            return Ok(Vec::new());
        }
        let opts = options.unwrap_or_else(|| self.default_options());

        let mut annotated = Vec::with_capacity(txs.len());
        for (group, chunk) in txs.chunks(self.config.batch_size).enumerate() {
            // 组内每笔交易独立计价：报价与估算也并发执行
            let results = try_join_all(chunk.iter().enumerate().map(|(index, tx)| async move {
                let (quote, gas_limit) = try_join(
                    self.priced_quote(opts.priority, opts.timeout_secs),
                    self.buffered_estimate(tx, opts.timeout_secs),
                )
                .await
                .map_err(|e| AppError::BatchEstimation {
                    group,
                    index,
                    reason: e.to_string(),
                })?;

                Ok::<AnnotatedTx, AppError>(AnnotatedTx {
                    to: tx.to,
                    value: tx.value,
                    data: tx.data.clone(),
                    gas_price: quote.price,
                    gas_limit,
                })
            }))
            .await?;

            log_info!("第 {} 组定价完成: {} 笔交易", group + 1, results.len());
            annotated.extend(results);
        }

        Ok(annotated)
    }

    /// 合约调用便捷定价：报价 + 缓冲估算，输出 EIP-1559 (type = 2) 交易
    pub async fn optimize_contract_call(
        &self,
        call: &DraftTx,
        options: Option<EstimateOptions>,
    ) -> Result<Eip1559TransactionRequest, AppError> {
        let opts = options.unwrap_or_else(|| self.default_options());

        let (quote, gas_limit) = try_join(
            self.priced_quote(opts.priority, opts.timeout_secs),
            self.buffered_estimate(call, opts.timeout_secs),
        )
        .await?;

        // max_fee 取建议价；小费取固定默认值，且不得超过 max_fee
        let max_fee = quote.price;
        let tip = U256::from(self.config.default_priority_fee_wei).min(max_fee);

        if quote.is_fallback() {
            log_warn!("合约调用以降级价格定价: {}", format_gwei(max_fee));
        }

        Ok(Eip1559TransactionRequest::new()
            .to(call.to)
            .value(call.value)
            .data(call.data.clone())
            .max_fee_per_gas(max_fee)
            .max_priority_fee_per_gas(tip)
            .gas(gas_limit))
    }

    /// 最近 ≤10 条估算的统计；历史为空时返回 None
    pub fn gas_stats(&self) -> Option<GasStats> {
        self.history.lock().unwrap().stats()
    }

    /// 立即清空估算历史（含累计计数）
    pub fn clear_history(&self) {
        self.history.lock().unwrap().clear();
        log_info!("估算历史已清空");
    }

    fn to_typed_tx(tx: &DraftTx) -> TypedTransaction {
        TransactionRequest::new()
            .to(tx.to)
            .value(tx.value)
            .data(tx.data.clone())
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::provider::BlockUtilization;
    use async_trait::async_trait;
    use ethers_core::types::{Bytes, H160, NameOrAddress};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 可编排的 Provider 桩：固定价格/区块数据，可注入失败与并发计数
    struct MockProvider {
        gas_price: U256,
        block: Option<BlockUtilization>,
        estimate: U256,
        /// 对该地址的估算返回 revert 错误
        revert_on: Option<H160>,
        estimate_delay_ms: u64,
        estimate_calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockProvider {
        fn new(gas_price: u64, block: Option<(u64, u64)>, estimate: u64) -> Self {
            Self {
                gas_price: U256::from(gas_price),
                block: block.map(|(gas_used, gas_limit)| BlockUtilization {
                    gas_used: U256::from(gas_used),
                    gas_limit: U256::from(gas_limit),
                }),
                estimate: U256::from(estimate),
                revert_on: None,
                estimate_delay_ms: 0,
                estimate_calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProviderTrait for MockProvider {
        async fn get_gas_price(&self) -> Result<U256, AppError> {
            Ok(self.gas_price)
        }

        async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, AppError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            if self.estimate_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.estimate_delay_ms)).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.estimate_calls.fetch_add(1, Ordering::SeqCst);

            let to = tx.to().and_then(NameOrAddress::as_address).copied();
            if self.revert_on.is_some() && to == self.revert_on {
                return Err(AppError::ProviderError(
                    "execution reverted: mock".to_string(),
                ));
            }
            Ok(self.estimate)
        }

        async fn get_latest_block(&self) -> Result<BlockUtilization, AppError> {
            self.block
                .ok_or_else(|| AppError::ProviderError("mock block failure".to_string()))
        }
    }

    fn draft(to_low: u64) -> DraftTx {
        DraftTx {
            to: H160::from_low_u64_be(to_low),
            value: U256::from(to_low),
            data: Bytes::default(),
        }
    }

    fn engine_with(provider: MockProvider, config: OptimizerConfig) -> GasEngine {
        GasEngine::new(config, Arc::new(provider)).unwrap()
    }

    fn test_config() -> OptimizerConfig {
        OptimizerConfig {
            max_gas_price_wei: 20_000_000_000,
            gas_buffer_percent: 110,
            batch_size: 10,
            history_capacity: 256,
            default_priority_fee_wei: 1_000_000_000,
            rpc_timeout_secs: 30,
        }
    }

    #[tokio::test]
    async fn high_congestion_surcharges() {
        // 利用率 90% > 80% → ×1.2
        let engine = engine_with(MockProvider::new(100, Some((9_000, 10_000)), 0), test_config());
        let quote = engine.get_optimal_gas_price().await.unwrap();
        assert_eq!(quote.price, U256::from(120u64));
        assert_eq!(
            quote.source,
            PriceSource::Quoted {
                congestion_bps: Some(9_000)
            }
        );
    }

    #[tokio::test]
    async fn low_congestion_discounts() {
        // 利用率 20% < 30% → ×0.9
        let engine = engine_with(MockProvider::new(100, Some((2_000, 10_000)), 0), test_config());
        let quote = engine.get_optimal_gas_price().await.unwrap();
        assert_eq!(quote.price, U256::from(90u64));
    }

    #[tokio::test]
    async fn medium_congestion_unchanged() {
        let engine = engine_with(MockProvider::new(100, Some((5_000, 10_000)), 0), test_config());
        let quote = engine.get_optimal_gas_price().await.unwrap();
        assert_eq!(quote.price, U256::from(100u64));
    }

    #[tokio::test]
    async fn full_block_hits_high_branch() {
        // gasUsed == gasLimit → 恰好 1.0，必须落入高拥堵档
        let engine = engine_with(MockProvider::new(100, Some((10_000, 10_000)), 0), test_config());
        let quote = engine.get_optimal_gas_price().await.unwrap();
        assert_eq!(quote.price, U256::from(120u64));
    }

    #[tokio::test]
    async fn surcharge_clamped_to_max() {
        // 基准 10、拥堵 0.9 → 调整后 12，上限 11 → 结果 11
        let mut config = test_config();
        config.max_gas_price_wei = 11;
        let engine = engine_with(MockProvider::new(10, Some((9_000, 10_000)), 0), config);
        let quote = engine.get_optimal_gas_price().await.unwrap();
        assert_eq!(quote.price, U256::from(11u64));
    }

    #[tokio::test]
    async fn zero_gas_limit_means_unknown_congestion() {
        let engine = engine_with(MockProvider::new(100, Some((0, 0)), 0), test_config());
        let quote = engine.get_optimal_gas_price().await.unwrap();
        // 拥堵度未知 → 不调整
        assert_eq!(quote.price, U256::from(100u64));
        assert_eq!(
            quote.source,
            PriceSource::Quoted {
                congestion_bps: None
            }
        );
    }

    #[tokio::test]
    async fn block_failure_falls_back_to_base_price() {
        let engine = engine_with(MockProvider::new(100, None, 0), test_config());
        let quote = engine.get_optimal_gas_price().await.unwrap();
        assert_eq!(quote.price, U256::from(100u64));
        assert!(quote.is_fallback());
    }

    #[tokio::test]
    async fn fallback_price_still_clamped() {
        let mut config = test_config();
        config.max_gas_price_wei = 50;
        let engine = engine_with(MockProvider::new(100, None, 0), config);
        let quote = engine.get_optimal_gas_price().await.unwrap();
        assert_eq!(quote.price, U256::from(50u64));
        assert!(quote.is_fallback());
    }

    #[tokio::test]
    async fn priority_multiplier_applied_and_clamped() {
        let engine = engine_with(MockProvider::new(100, Some((5_000, 10_000)), 0), test_config());

        let instant = engine.price_for_priority(GasPriority::Instant).await.unwrap();
        assert_eq!(instant.price, U256::from(125u64));

        let slow = engine.price_for_priority(GasPriority::Slow).await.unwrap();
        assert_eq!(slow.price, U256::from(90u64));

        // 上限 110：instant 125 被钳制
        let mut config = test_config();
        config.max_gas_price_wei = 110;
        let engine = engine_with(MockProvider::new(100, Some((5_000, 10_000)), 0), config);
        let instant = engine.price_for_priority(GasPriority::Instant).await.unwrap();
        assert_eq!(instant.price, U256::from(110u64));
    }

    #[tokio::test]
    async fn buffered_estimate_floors_and_records() {
        // 21000 × 1.1 = 23100
        let engine = engine_with(
            MockProvider::new(100, Some((5_000, 10_000)), 21_000),
            test_config(),
        );
        let buffered = engine.estimate_gas_with_buffer(&draft(1)).await.unwrap();
        assert_eq!(buffered, U256::from(23_100u64));

        let stats = engine.gas_stats().unwrap();
        assert_eq!(stats.total_estimates, 1);
        assert_eq!(stats.avg_raw_gas, U256::from(21_000u64));
        assert_eq!(stats.avg_buffered_gas, U256::from(23_100u64));
        assert_eq!(stats.buffer_overhead_percent, Some(10.0));
    }

    #[tokio::test]
    async fn revert_surfaces_unchanged_and_skips_history() {
        let mut provider = MockProvider::new(100, Some((5_000, 10_000)), 21_000);
        provider.revert_on = Some(H160::from_low_u64_be(7));
        let engine = engine_with(provider, test_config());

        let err = engine.estimate_gas_with_buffer(&draft(7)).await.unwrap_err();
        match err {
            AppError::EstimationFailed { reason, .. } => {
                assert!(reason.contains("execution reverted"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // 失败的估算不得进入历史
        assert!(engine.gas_stats().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn batch_preserves_order_and_bounds_concurrency() {
        let mut mock = MockProvider::new(100, Some((5_000, 10_000)), 21_000);
        mock.estimate_delay_ms = 5;
        let provider = Arc::new(mock);
        let engine = GasEngine::new(test_config(), provider.clone()).unwrap();

        let txs: Vec<DraftTx> = (0..25).map(draft).collect();
        let annotated = engine.batch_transactions(&txs, None).await.unwrap();

        // 长度与顺序保持
        assert_eq!(annotated.len(), 25);
        for (i, tx) in annotated.iter().enumerate() {
            assert_eq!(tx.to, H160::from_low_u64_be(i as u64));
            assert_eq!(tx.value, U256::from(i as u64));
            assert_eq!(tx.gas_limit, U256::from(23_100u64));
            assert_eq!(tx.gas_price, U256::from(100u64));
        }

        // 25 笔全部估算；组内并发受 batch_size = 10 约束（10/10/5）
        assert_eq!(provider.estimate_calls.load(Ordering::SeqCst), 25);
        assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn batch_failure_names_group_and_index() {
        // 第 12 笔（第 1 组第 2 笔，0 起）revert
        let mut mock = MockProvider::new(100, Some((5_000, 10_000)), 21_000);
        mock.revert_on = Some(H160::from_low_u64_be(12));
        let engine = engine_with(mock, test_config());

        let txs: Vec<DraftTx> = (0..25).map(draft).collect();
        let err = engine.batch_transactions(&txs, None).await.unwrap_err();
        match err {
            AppError::BatchEstimation { group, index, reason } => {
                assert_eq!(group, 1);
                assert_eq!(index, 2);
                assert!(reason.contains("execution reverted"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_batch_is_a_noop() {
        let provider = Arc::new(MockProvider::new(100, Some((5_000, 10_000)), 21_000));
        let engine = GasEngine::new(test_config(), provider.clone()).unwrap();

        let annotated = engine.batch_transactions(&[], None).await.unwrap();
        assert!(annotated.is_empty());
        assert_eq!(provider.estimate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn optimize_contract_call_builds_eip1559_request() {
        let engine = engine_with(
            MockProvider::new(10_000_000_000, Some((5_000, 10_000)), 21_000),
            test_config(),
        );

        let call = draft(42);
        let request = engine.optimize_contract_call(&call, None).await.unwrap();

        assert_eq!(request.to, Some(NameOrAddress::Address(call.to)));
        assert_eq!(request.max_fee_per_gas, Some(U256::from(10_000_000_000u64)));
        // 默认小费 1 gwei，不超过 max_fee
        assert_eq!(
            request.max_priority_fee_per_gas,
            Some(U256::from(1_000_000_000u64))
        );
        assert_eq!(request.gas, Some(U256::from(23_100u64)));
    }

    #[tokio::test]
    async fn tip_capped_at_max_fee() {
        // max_fee 被钳到 5 wei < 默认小费 → 小费跟着压到 5
        let mut config = test_config();
        config.max_gas_price_wei = 5;
        let engine = engine_with(MockProvider::new(100, Some((5_000, 10_000)), 21_000), config);

        let request = engine.optimize_contract_call(&draft(1), None).await.unwrap();
        assert_eq!(request.max_fee_per_gas, Some(U256::from(5u64)));
        assert_eq!(request.max_priority_fee_per_gas, Some(U256::from(5u64)));
    }

    #[tokio::test]
    async fn clear_history_takes_effect_immediately() {
        let engine = engine_with(
            MockProvider::new(100, Some((5_000, 10_000)), 21_000),
            test_config(),
        );

        engine.estimate_gas_with_buffer(&draft(1)).await.unwrap();
        engine.estimate_gas_with_buffer(&draft(2)).await.unwrap();
        assert_eq!(engine.gas_stats().unwrap().total_estimates, 2);

        engine.clear_history();
        assert!(engine.gas_stats().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_slow_estimation() {
        let mut mock = MockProvider::new(100, Some((5_000, 10_000)), 21_000);
        mock.estimate_delay_ms = 5_000;
        let mut config = test_config();
        config.rpc_timeout_secs = 1;
        let engine = engine_with(mock, config);

        let err = engine.estimate_gas_with_buffer(&draft(1)).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(1)));
        // 超时的估算同样不得进入历史
        assert!(engine.gas_stats().is_none());
    }

    #[tokio::test]
    async fn invalid_config_rejected_at_construction() {
        let mut config = test_config();
        config.gas_buffer_percent = 99;
        let result = GasEngine::new(
            config,
            Arc::new(MockProvider::new(100, Some((5_000, 10_000)), 21_000)),
        );
        assert!(matches!(result, Err(AppError::InvalidConfig(_))));
    }
}
